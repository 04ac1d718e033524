#[cfg(test)]
pub mod test {
    use std::collections::HashMap;
    use std::io;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use parking_lot::Mutex;

    use crate::error::ConfigError;
    use crate::field::Field;
    use crate::file::{FilePlugin, FileReader};
    use crate::parameter::{Parameter, ParameterFetcher};
    use crate::plugin::{Plugin, PluginSet};
    use crate::provider::Provider;
    use crate::remote::RemoteError;
    use crate::secret::SecretFetcher;
    use crate::value::Value;

    /// A field whose only enabled plugin is `plugin`.
    pub fn plugin_field<P: Plugin>(plugin: Arc<P>) -> Field {
        let mut set = PluginSet::default();
        set.insert(plugin);
        Field::with_plugins(set, false)
    }

    pub fn file_field(plugin: Arc<FilePlugin>) -> Field {
        plugin_field(plugin)
    }

    /// A field backed by one [`Fixed`] provider per entry.
    pub fn chain(values: Vec<Option<Value>>) -> Field {
        values
            .into_iter()
            .fold(Field::default(), |field, v| field.from_provider(Fixed::new("fixed", v)))
    }

    // -- Providers ---------------------------------------------------------------

    /// Returns the same outcome every time.
    pub struct Fixed {
        kind: &'static str,
        value: Option<Value>,
        fail: bool,
    }

    impl Fixed {
        pub fn new(kind: &'static str, value: Option<Value>) -> Self {
            Self {
                kind,
                value,
                fail: false,
            }
        }

        pub fn failing(kind: &'static str) -> Self {
            Self {
                kind,
                value: None,
                fail: true,
            }
        }
    }

    impl Provider for Fixed {
        fn kind(&self) -> &'static str {
            self.kind
        }

        fn provide(&self) -> Result<Option<Value>, ConfigError> {
            if self.fail {
                return Err(ConfigError::Cast {
                    value: "broken".into(),
                    target: "anything",
                });
            }
            Ok(self.value.clone())
        }
    }

    #[derive(Clone, Default)]
    pub struct Calls(Arc<AtomicUsize>);

    impl Calls {
        pub fn get(&self) -> usize {
            self.0.load(Ordering::SeqCst)
        }
    }

    /// Like [`Fixed`], but counts how often it is asked.
    pub struct CountingProvider {
        inner: Fixed,
        calls: Calls,
    }

    impl CountingProvider {
        pub fn new(kind: &'static str, value: Option<Value>) -> Self {
            Self {
                inner: Fixed::new(kind, value),
                calls: Calls::default(),
            }
        }

        pub fn calls(&self) -> Calls {
            self.calls.clone()
        }
    }

    impl Provider for CountingProvider {
        fn kind(&self) -> &'static str {
            self.inner.kind()
        }

        fn provide(&self) -> Result<Option<Value>, ConfigError> {
            self.calls.0.fetch_add(1, Ordering::SeqCst);
            self.inner.provide()
        }
    }

    /// Provides another field's resolved value.
    pub struct ReadField(pub Field);

    impl Provider for ReadField {
        fn kind(&self) -> &'static str {
            "read_field"
        }

        fn provide(&self) -> Result<Option<Value>, ConfigError> {
            self.0.resolve()
        }

        fn dependencies(&self) -> Vec<Field> {
            vec![self.0.clone()]
        }
    }

    // -- Collaborators -----------------------------------------------------------

    /// Serves the same content for every path, or "not found" when `None`.
    pub struct FakeReader {
        content: Option<String>,
        paths: Mutex<Vec<PathBuf>>,
    }

    impl FakeReader {
        pub fn new(content: Option<&str>) -> Self {
            Self {
                content: content.map(str::to_string),
                paths: Mutex::new(Vec::new()),
            }
        }

        pub fn reads(&self) -> usize {
            self.paths.lock().len()
        }

        pub fn paths(&self) -> Vec<PathBuf> {
            self.paths.lock().clone()
        }
    }

    impl FileReader for FakeReader {
        fn read_to_string(&self, path: &Path) -> io::Result<String> {
            self.paths.lock().push(path.to_path_buf());
            self.content
                .clone()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such file"))
        }
    }

    /// An in-memory parameter store that records every request.
    pub struct FakeParameters {
        values: HashMap<String, String>,
        requests: Mutex<Vec<Vec<String>>>,
        fail_next: AtomicBool,
    }

    impl FakeParameters {
        pub fn new(values: impl IntoIterator<Item = (String, String)>) -> Self {
            Self {
                values: values.into_iter().collect(),
                requests: Mutex::new(Vec::new()),
                fail_next: AtomicBool::new(false),
            }
        }

        /// Make the next request fail with a transport error.
        pub fn fail_next(&self) {
            self.fail_next.store(true, Ordering::SeqCst);
        }

        pub fn recorded(&self) -> Vec<Vec<String>> {
            self.requests.lock().clone()
        }
    }

    impl ParameterFetcher for FakeParameters {
        fn get_parameters(&self, names: &[String]) -> Result<Vec<Parameter>, RemoteError> {
            if self.fail_next.swap(false, Ordering::SeqCst) {
                return Err(RemoteError::other("connection reset"));
            }
            assert!(names.len() <= crate::parameter::MAX_BATCH);
            self.requests.lock().push(names.to_vec());
            Ok(names
                .iter()
                .filter_map(|n| {
                    self.values.get(n).map(|v| Parameter {
                        name: n.clone(),
                        value: v.clone(),
                    })
                })
                .collect())
        }
    }

    enum SecretAnswer {
        Payload(Option<String>),
        NotFound,
        Broken,
    }

    /// A secret store that gives the same answer for every secret.
    pub struct FakeSecrets {
        answer: SecretAnswer,
        requests: Mutex<Vec<String>>,
    }

    impl FakeSecrets {
        fn answering(answer: SecretAnswer) -> Self {
            Self {
                answer,
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn returning(payload: Option<&str>) -> Self {
            Self::answering(SecretAnswer::Payload(payload.map(str::to_string)))
        }

        pub fn not_found() -> Self {
            Self::answering(SecretAnswer::NotFound)
        }

        pub fn broken() -> Self {
            Self::answering(SecretAnswer::Broken)
        }

        pub fn recorded(&self) -> Vec<String> {
            self.requests.lock().clone()
        }
    }

    impl SecretFetcher for FakeSecrets {
        fn get_secret_value(&self, secret_id: &str) -> Result<Option<String>, RemoteError> {
            self.requests.lock().push(secret_id.to_string());
            match &self.answer {
                SecretAnswer::Payload(p) => Ok(p.clone()),
                SecretAnswer::NotFound => Err(RemoteError::NotFound(secret_id.to_string())),
                SecretAnswer::Broken => Err(RemoteError::other("access denied")),
            }
        }
    }
}
