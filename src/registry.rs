use chrono::Utc;
use rand::Rng;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::RunnerConfig;
use crate::error::SubstitutionError;
use crate::variable_store::read_store_file;

/// A helper callable invocable from within a `${name(args)}` expression.
/// Arguments arrive as raw strings split from the expression text.
pub type HelperFn =
    Arc<dyn Fn(&[String]) -> Result<Value, SubstitutionError> + Send + Sync>;

/// Named set of helper functions usable inside substitution expressions.
/// Populated once at startup; immutable afterwards apart from explicit
/// `register` calls made before the run begins.
pub struct HelperRegistry {
    functions: HashMap<String, HelperFn>,
}

/// Common single-character Chinese surnames, used by `random_name`.
const SURNAMES: &[char] = &[
    '王', '李', '张', '刘', '陈', '杨', '黄', '赵', '周', '吴', '徐', '孙', '马', '朱', '胡',
];

fn invalid_arg(function: &str, message: impl Into<String>) -> SubstitutionError {
    SubstitutionError::InvalidArgument {
        function: function.to_string(),
        message: message.into(),
    }
}

fn random_cjk_char() -> char {
    let cp = rand::thread_rng().gen_range(0x4E00u32..=0x9FFF);
    // every codepoint in the CJK unified block is a valid char
    char::from_u32(cp).unwrap_or('文')
}

impl HelperRegistry {
    /// Empty registry with no helpers. Mostly useful in tests.
    pub fn empty() -> Self {
        Self {
            functions: HashMap::new(),
        }
    }

    /// Registry loaded with the built-in helper set.
    ///
    /// `store_path` is the persisted variable-store document consulted by
    /// `read_yaml`; `config_path` is the runner configuration consulted by
    /// `env`. Both files are opened fresh on every call, so values written
    /// earlier in the run are visible without restarting.
    pub fn with_builtins<P: AsRef<Path>, Q: AsRef<Path>>(store_path: P, config_path: Q) -> Self {
        let mut registry = Self::empty();
        let store_path: PathBuf = store_path.as_ref().to_path_buf();
        let config_path: PathBuf = config_path.as_ref().to_path_buf();

        registry.register("read_yaml", move |args: &[String]| {
            let key = args
                .first()
                .filter(|k| !k.is_empty())
                .ok_or_else(|| invalid_arg("read_yaml", "missing key argument"))?;
            read_store_file(&store_path)
                .remove(key.as_str())
                .ok_or_else(|| {
                    invalid_arg("read_yaml", format!("key '{}' not found in store", key))
                })
        });

        registry.register("env", move |args: &[String]| {
            let key = args
                .first()
                .filter(|k| !k.is_empty())
                .ok_or_else(|| invalid_arg("env", "missing key argument"))?;
            let config = RunnerConfig::load(&config_path)
                .map_err(|e| invalid_arg("env", e.to_string()))?;
            config
                .environment
                .get(key.as_str())
                .map(|v| Value::String(v.clone()))
                .ok_or_else(|| invalid_arg("env", format!("key '{}' not found", key)))
        });

        registry.register("add", |args: &[String]| {
            if args.len() != 2 {
                return Err(invalid_arg("add", format!("expected 2 args, got {}", args.len())));
            }
            let a: i64 = args[0]
                .trim()
                .parse()
                .map_err(|_| invalid_arg("add", format!("'{}' is not an integer", args[0])))?;
            let b: i64 = args[1]
                .trim()
                .parse()
                .map_err(|_| invalid_arg("add", format!("'{}' is not an integer", args[1])))?;
            Ok(Value::Number((a + b).into()))
        });

        registry.register("md5", |args: &[String]| {
            let data = args.join(",");
            Ok(Value::String(format!("{:x}", md5::compute(data.as_bytes()))))
        });

        registry.register("timestamp", |_args: &[String]| {
            Ok(Value::String(Utc::now().timestamp().to_string()))
        });

        registry.register("random_str_name", |args: &[String]| {
            let length: usize = match args.first().filter(|a| !a.is_empty()) {
                Some(raw) => raw.trim().parse().map_err(|_| {
                    invalid_arg("random_str_name", format!("'{}' is not a length", raw))
                })?,
                None => 3,
            };
            if length == 0 {
                return Err(invalid_arg("random_str_name", "length must be greater than 0"));
            }
            let name: String = (0..length).map(|_| random_cjk_char()).collect();
            Ok(Value::String(name))
        });

        registry.register("random_name", |_args: &[String]| {
            let (surname, given_len) = {
                let mut rng = rand::thread_rng();
                (SURNAMES[rng.gen_range(0..SURNAMES.len())], rng.gen_range(1..=2usize))
            };
            let given: String = (0..given_len).map(|_| random_cjk_char()).collect();
            Ok(Value::String(format!("{}{}", surname, given)))
        });

        registry.register("random_mobile", |_args: &[String]| {
            let mut rng = rand::thread_rng();
            let second = rng.gen_range(3..=9u8);
            let rest: String = (0..9).map(|_| char::from(b'0' + rng.gen_range(0..10u8))).collect();
            Ok(Value::String(format!("1{}{}", second, rest)))
        });

        registry
    }

    /// Register a helper under `name`, replacing any existing helper.
    pub fn register<F>(&mut self, name: &str, f: F)
    where
        F: Fn(&[String]) -> Result<Value, SubstitutionError> + Send + Sync + 'static,
    {
        self.functions.insert(name.to_string(), Arc::new(f));
    }

    /// Invoke the helper `name` with raw string arguments.
    pub fn resolve(&self, name: &str, args: &[String]) -> Result<Value, SubstitutionError> {
        let f = self
            .functions
            .get(name)
            .ok_or_else(|| SubstitutionError::UnknownFunction(name.to_string()))?;
        f(args)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }
}
