use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    // IP geolocation provider
    pub api_token: Option<String>,
    pub api_base_url: String,
    pub request_timeout_secs: u64,

    // Checked-set files (one per namespace)
    pub checked_ips_path: String,
    pub checked_macs_path: String,

    // Vendor-prefix table
    pub oui_table_path: String,

    // Batch engine
    pub cache_not_found: bool,
    pub lookup_concurrency: usize,
    pub commit_interval: usize,

    // REST adapter
    pub api_listen_addr: String,

    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_token: None,
            api_base_url: "https://ipinfo.io".to_string(),
            request_timeout_secs: 10,
            checked_ips_path: "checked_ips.csv".to_string(),
            checked_macs_path: "checked_macs.csv".to_string(),
            oui_table_path: "oui.csv".to_string(),
            cache_not_found: true,
            lookup_concurrency: 1,
            commit_interval: 0,
            api_listen_addr: "0.0.0.0:8000".to_string(),
            debug: false,
        }
    }
}

pub fn load_config() -> anyhow::Result<Config> {
    let api_token = std::env::var("NETLOOKUP_API_TOKEN")
        .ok()
        .filter(|t| !t.trim().is_empty());

    let api_base_url = std::env::var("NETLOOKUP_API_BASE_URL")
        .unwrap_or_else(|_| "https://ipinfo.io".to_string());

    let request_timeout_secs = std::env::var("NETLOOKUP_REQUEST_TIMEOUT_SECS")
        .unwrap_or_else(|_| "10".to_string())
        .parse()
        .unwrap_or(10);

    let checked_ips_path = std::env::var("NETLOOKUP_CHECKED_IPS_PATH")
        .unwrap_or_else(|_| "checked_ips.csv".to_string());

    let checked_macs_path = std::env::var("NETLOOKUP_CHECKED_MACS_PATH")
        .unwrap_or_else(|_| "checked_macs.csv".to_string());

    let oui_table_path = std::env::var("NETLOOKUP_OUI_TABLE_PATH")
        .unwrap_or_else(|_| "oui.csv".to_string());

    let cache_not_found = std::env::var("NETLOOKUP_CACHE_NOT_FOUND")
        .map(|v| v == "1" || v.to_lowercase() == "true")
        .unwrap_or(true);

    // A zero fan-out would never dispatch anything.
    let lookup_concurrency = std::env::var("NETLOOKUP_LOOKUP_CONCURRENCY")
        .unwrap_or_else(|_| "1".to_string())
        .parse::<usize>()
        .unwrap_or(1)
        .max(1);

    let commit_interval = std::env::var("NETLOOKUP_COMMIT_INTERVAL")
        .unwrap_or_else(|_| "0".to_string())
        .parse()
        .unwrap_or(0);

    let api_listen_addr = std::env::var("NETLOOKUP_API_LISTEN_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8000".to_string());

    let debug = std::env::var("DEBUG").is_ok();

    Ok(Config {
        api_token,
        api_base_url,
        request_timeout_secs,
        checked_ips_path,
        checked_macs_path,
        oui_table_path,
        cache_not_found,
        lookup_concurrency,
        commit_interval,
        api_listen_addr,
        debug,
    })
}
