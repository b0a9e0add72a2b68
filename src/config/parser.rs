use crate::config::types::Config;
use crate::config::validation::{normalize, validate};
use crate::ConfigError;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Loads the configuration, applies environment overrides and validates it
///
/// # Arguments
///
/// * `path` - Optional path to a TOML configuration file. Without one the
///   built-in defaults are used as the base layer.
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use catalog_crawler::config::load_config;
///
/// let config = load_config(Some(Path::new("crawler.toml"))).unwrap();
/// println!("Chunk size: {}", config.crawler.chunk_size);
/// ```
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => Config::default(),
    };

    apply_overrides(&mut config, std::env::vars());
    normalize(&mut config);
    validate(&config)?;

    Ok(config)
}

/// Applies environment-style overrides to a configuration
///
/// Keys that are not recognized are ignored. `KAFKA_BROKERS` names native
/// bootstrap servers, which the REST-based broker sink cannot use, so it
/// is ignored with a warning. Numeric values that fail to
/// parse are ignored with a warning so that a typo never silently zeroes a
/// limit.
///
/// # Arguments
///
/// * `config` - The configuration to modify in place
/// * `vars` - Key/value pairs, usually `std::env::vars()`
pub fn apply_overrides<I, K, V>(config: &mut Config, vars: I)
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<String>,
{
    for (key, value) in vars {
        let value: String = value.into();
        match key.as_ref() {
            "PARSER_USER_AGENT" => config.http.user_agent = value,
            "PARSER_MAX_RETRIES" => set_parsed(&mut config.http.max_retries, "PARSER_MAX_RETRIES", &value),
            "PARSER_RETRY_DELAY" => {
                set_parsed(&mut config.http.retry_base_delay_ms, "PARSER_RETRY_DELAY", &value)
            }
            "PARSER_REQUEST_DELAY" => {
                set_parsed(&mut config.crawler.request_delay_ms, "PARSER_REQUEST_DELAY", &value)
            }
            "PARSER_CONCURRENCY" => {
                set_parsed(&mut config.crawler.concurrency, "PARSER_CONCURRENCY", &value)
            }
            "PARSER_CHUNK_SIZE" => {
                set_parsed(&mut config.crawler.chunk_size, "PARSER_CHUNK_SIZE", &value)
            }
            "USE_MOCK_PRODUCER" => config.sink.mock = parse_flag(&value),
            "MOCK_OUTPUT_DIR" => config.sink.file.output_dir = PathBuf::from(value),
            "KAFKA_REST_URL" => config.sink.broker.rest_url = value,
            "KAFKA_BROKERS" => tracing::warn!(
                "Ignoring KAFKA_BROKERS={:?}: records go through the REST proxy, set KAFKA_REST_URL",
                value
            ),
            "KAFKA_TOPIC_BRANDS" => config.sink.broker.brands_topic = value,
            "KAFKA_TOPIC_PRODUCTS" => config.sink.broker.products_topic = value,
            "KAFKA_TOPIC_QUANTITIES" => config.sink.broker.quantities_topic = value,
            "WB_API_BASE_URL" => config.endpoints.api_base_url = value,
            "WB_CATALOG_API_URL" => config.endpoints.catalog_api_url = value,
            "WB_CARD_API_URL" => config.endpoints.card_api_url = value,
            "WB_STATIC_API_URL" => config.endpoints.static_api_url = value,
            "BRAND_DB_PATH" => config.storage.database_path = PathBuf::from(value),
            "LETTERS_PATH" => config.crawler.letters_path = PathBuf::from(value),
            _ => {}
        }
    }
}

fn set_parsed<T: FromStr>(target: &mut T, key: &str, value: &str) {
    match value.trim().parse() {
        Ok(parsed) => *target = parsed,
        Err(_) => tracing::warn!("Ignoring {}={:?}: not a valid number", key, value),
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Computes a SHA-256 hash of the configuration file content
///
/// The hash is logged at startup so that runs can be matched to the exact
/// configuration they used.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the file content
/// * `Err(ConfigError)` - Failed to read the file
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

/// Loads a configuration and returns both the config and its hash
///
/// Without a file there is nothing to fingerprint and the hash is `None`.
pub fn load_config_with_hash(path: Option<&Path>) -> Result<(Config, Option<String>), ConfigError> {
    let config = load_config(path)?;
    let hash = path.map(compute_config_hash).transpose()?;
    Ok((config, hash))
}

#[derive(Debug, Deserialize)]
struct LettersFile {
    #[serde(default)]
    letters: Vec<LetterEntry>,
}

#[derive(Debug, Deserialize)]
struct LetterEntry {
    name: Option<String>,
}

/// Loads the brand-list alphabet
///
/// The file has the shape `{"letters": [{"name": "A"}, ...]}`. Entries
/// without a name are skipped.
///
/// # Returns
///
/// * `Ok(Vec<String>)` - The letters in file order
/// * `Err(ConfigError)` - The file is unreadable, malformed or holds no letters
pub fn load_letters(path: &Path) -> Result<Vec<String>, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let file: LettersFile = serde_json::from_str(&content)?;

    let letters: Vec<String> = file
        .letters
        .into_iter()
        .filter_map(|entry| entry.name)
        .filter(|name| !name.is_empty())
        .collect();

    if letters.is_empty() {
        return Err(ConfigError::Validation(format!(
            "No letters found in {}",
            path.display()
        )));
    }

    tracing::info!("Loaded {} brand letters from {}", letters.len(), path.display());
    Ok(letters)
}
