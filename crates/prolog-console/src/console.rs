//! One console instance: editor, session manager, history, completion and
//! namespace refresher wired together.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing::{debug, info, warn};

use prolog_console_core::{
    Completion, CompletionContext, ConsoleCommand, ConsoleConfig, HistoryPersistence, KeyChord,
    Platform, QueryId, Result,
};
use prolog_console_session::{
    identifier_prefix, CompletionRegistry, ConsoleObserver,
    DisabledHistoryStore, Editor, HistoryNavigator, HistoryStore, InMemoryHistoryStore,
    NamespacePrefixMap, NamespaceRefresher, NoopObserver, PredicateNameCache, QueryClient,
    QuerySessionManager, RemoteHistoryStore,
};

/// Builder for [`PrologConsole`].
pub struct PrologConsoleBuilder {
    client: Arc<dyn QueryClient>,
    editor: Arc<dyn Editor>,
    observer: Option<Arc<dyn ConsoleObserver>>,
    history_store: Option<Arc<dyn HistoryStore>>,
    config: ConsoleConfig,
    platform: Platform,
}

impl PrologConsoleBuilder {
    /// Receive submissions, answers and session ends.
    pub fn observer(mut self, observer: Arc<dyn ConsoleObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Use `store` instead of the one selected by `history.persistence`.
    pub fn history_store(mut self, store: Arc<dyn HistoryStore>) -> Self {
        self.history_store = Some(store);
        self
    }

    /// Use `config`.
    pub fn config(mut self, config: ConsoleConfig) -> Self {
        self.config = config;
        self
    }

    /// Load the configuration from a YAML file.
    pub fn config_file<P: AsRef<Path>>(self, path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let config = ConsoleConfig::from_file(path)
            .with_context(|| format!("failed to load console config from {}", path.display()))?;
        Ok(self.config(config))
    }

    /// Pick key bindings for `platform` instead of the detected one.
    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Validate the configuration and assemble the console.
    pub fn build(self) -> Result<PrologConsole> {
        self.config.validate()?;

        let mut keymap = HashMap::new();
        for command in ConsoleCommand::ALL {
            let chord = self.config.keys.binding(command)?.for_platform(self.platform);
            keymap.insert(chord, command);
        }

        let history_store: Arc<dyn HistoryStore> = match self.history_store {
            Some(store) => store,
            None => match self.config.history.persistence {
                HistoryPersistence::Remote => {
                    Arc::new(RemoteHistoryStore::new(Arc::clone(&self.client)))
                }
                HistoryPersistence::Memory => Arc::new(InMemoryHistoryStore::new()),
                HistoryPersistence::Disabled => Arc::new(DisabledHistoryStore),
            },
        };
        let history = Arc::new(HistoryNavigator::new(
            history_store,
            Arc::clone(&self.editor),
        ));

        let observer: Arc<dyn ConsoleObserver> = match self.observer {
            Some(observer) => observer,
            None => Arc::new(NoopObserver),
        };
        let manager = QuerySessionManager::new(
            Arc::clone(&self.client),
            Arc::clone(&self.editor),
            observer,
            history,
            self.config.query.trailing_period,
        );

        let predicate_names = Arc::new(PredicateNameCache::new(
            Arc::clone(&self.client),
            self.config.query.predicate_names_query.clone(),
            self.config.completion.score,
            self.config.completion.source_tag.clone(),
        ));

        Ok(PrologConsole {
            client: self.client,
            editor: self.editor,
            config: self.config,
            platform: self.platform,
            keymap,
            manager,
            registry: CompletionRegistry::new(),
            predicate_names,
            namespaces: Arc::new(NamespacePrefixMap::new()),
            refresher: None,
            initialized: false,
        })
    }
}

/// A Prolog query console bound to one editor.
///
/// Everything a console needs is owned by the instance, so several consoles
/// can live side by side without sharing completion or refresh state.
pub struct PrologConsole {
    client: Arc<dyn QueryClient>,
    editor: Arc<dyn Editor>,
    config: ConsoleConfig,
    platform: Platform,
    keymap: HashMap<KeyChord, ConsoleCommand>,
    manager: QuerySessionManager,
    registry: CompletionRegistry,
    predicate_names: Arc<PredicateNameCache>,
    namespaces: Arc<NamespacePrefixMap>,
    refresher: Option<NamespaceRefresher>,
    initialized: bool,
}

impl PrologConsole {
    /// Start building a console talking to `client` through `editor`.
    pub fn builder(client: Arc<dyn QueryClient>, editor: Arc<dyn Editor>) -> PrologConsoleBuilder {
        PrologConsoleBuilder {
            client,
            editor,
            observer: None,
            history_store: None,
            config: ConsoleConfig::default(),
            platform: Platform::detect(),
        }
    }

    /// Register the key bindings and the completer, and start the namespace
    /// refresher if enabled.
    ///
    /// Calling it again has no effect.
    pub fn init(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }

        for command in ConsoleCommand::ALL {
            let chord = self.config.keys.binding(command)?.for_platform(self.platform);
            debug!(command = command.name(), %chord, "Binding console command");
            self.editor.bind_command(command, chord);
        }

        if self.config.completion.enabled {
            self.registry.add(self.predicate_names.clone());
        }

        if self.config.namespaces.enabled {
            if tokio::runtime::Handle::try_current().is_ok() {
                self.refresher = Some(NamespaceRefresher::start(
                    Arc::clone(&self.client),
                    Arc::clone(&self.namespaces),
                    &self.config.namespaces,
                )?);
            } else {
                warn!("No tokio runtime, namespace prefixes will not be refreshed");
            }
        }

        self.initialized = true;
        info!(platform = %self.platform, "Prolog console initialised");
        Ok(())
    }

    /// Whether [`PrologConsole::init`] has run.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Run `command`.
    pub fn execute(&self, command: ConsoleCommand) {
        debug!(command = command.name(), "Executing console command");
        match command {
            ConsoleCommand::SubmitQuery => {
                self.manager.submit_query(None);
            }
            ConsoleCommand::NextSolution => self.manager.request_next_solution(),
            ConsoleCommand::HistoryNext => {
                self.manager.history().next();
            }
            ConsoleCommand::HistoryPrevious => {
                self.manager.history().previous();
            }
        }
    }

    /// Run the command bound to `chord`. Returns `false` if none is bound.
    pub fn handle_key(&self, chord: &KeyChord) -> bool {
        match self.keymap.get(chord) {
            Some(command) => {
                self.execute(*command);
                true
            }
            None => false,
        }
    }

    /// Command bound to `chord` on this console's platform.
    pub fn command_for(&self, chord: &KeyChord) -> Option<ConsoleCommand> {
        self.keymap.get(chord).copied()
    }

    /// Submit `text`, or the editor contents when `None`.
    pub fn submit_query(&self, text: Option<&str>) -> Option<QueryId> {
        self.manager.submit_query(text)
    }

    /// Completions for `prefix` at `context`.
    pub fn completions(&self, context: &CompletionContext, prefix: &str) -> Vec<Completion> {
        self.registry.completions(context, prefix)
    }

    /// Completions for the identifier typed right before the caret.
    pub fn completions_at(&self, context: &CompletionContext) -> Vec<Completion> {
        self.completions(context, &identifier_prefix(context))
    }

    /// Replace the editor contents with `text`, caret at the end.
    pub fn set_query_value(&self, text: &str, focus: bool) {
        self.editor.set_text(text);
        if focus {
            self.editor.focus();
        }
    }

    /// Session manager of this console.
    pub fn manager(&self) -> &QuerySessionManager {
        &self.manager
    }

    /// Predicate-name cache feeding completion.
    pub fn predicate_names(&self) -> &Arc<PredicateNameCache> {
        &self.predicate_names
    }

    /// Namespace prefixes known to the service.
    pub fn namespaces(&self) -> &Arc<NamespacePrefixMap> {
        &self.namespaces
    }

    /// Configuration in effect.
    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    /// Platform whose key bindings are used.
    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Whether the namespace refresher is running.
    pub fn is_refreshing(&self) -> bool {
        self.refresher
            .as_ref()
            .is_some_and(NamespaceRefresher::is_running)
    }

    /// Close the open query and stop the namespace refresher.
    pub async fn dispose(&mut self) -> Result<()> {
        self.manager.terminate();
        if let Some(mut refresher) = self.refresher.take() {
            refresher.stop().await?;
        }
        info!("Prolog console disposed");
        Ok(())
    }
}
