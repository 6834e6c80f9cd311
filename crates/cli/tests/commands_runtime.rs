use std::env;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::thread;

use rust_decimal::Decimal;
use serde_json::Value;
use tempfile::TempDir;
use winquote_cli::commands::quote::QuoteArgs;
use winquote_cli::commands::{catalog, config, quote};
use winquote_core::config::LoadOptions;

const MANAGED_KEYS: &[&str] = &[
    "WINQUOTE_CATALOG_URL",
    "WINQUOTE_CATALOG_MAX_CONNECTIONS",
    "WINQUOTE_CATALOG_TIMEOUT_SECS",
    "WINQUOTE_EXTRACTION_PROVIDER",
    "WINQUOTE_EXTRACTION_API_KEY",
    "WINQUOTE_EXTRACTION_BASE_URL",
    "WINQUOTE_EXTRACTION_MODEL",
    "WINQUOTE_EXTRACTION_TIMEOUT_SECS",
    "WINQUOTE_EXTRACTION_MAX_FILE_MB",
    "WINQUOTE_LOGGING_LEVEL",
    "WINQUOTE_LOG_LEVEL",
    "WINQUOTE_LOGGING_FORMAT",
    "WINQUOTE_LOG_FORMAT",
    "GEMINI_API_KEY",
];

#[test]
fn quote_prices_a_complete_configuration() {
    let workspace = Workspace::new();
    with_env(&[("WINQUOTE_CATALOG_URL", workspace.database_url().as_str())], || {
        let result = quote::run(
            &LoadOptions::default(),
            quote_args(&["material=pvc", "opening=battente", "glass=double", "color=white"]),
        );
        assert_eq!(result.exit_code, 0, "expected a priced quote: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "quote");
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["message"], "estimated total: 386 EUR");
        assert_eq!(payload["data"]["step_id"], "color");
        assert_eq!(payload["data"]["progress_pct"], 100);
    });
}

#[test]
fn quote_stops_at_first_missing_selection() {
    let workspace = Workspace::new();
    with_env(&[("WINQUOTE_CATALOG_URL", workspace.database_url().as_str())], || {
        let result = quote::run(&LoadOptions::default(), quote_args(&["material=wood"]));
        assert_eq!(result.exit_code, 5, "expected validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "validation");
        assert_eq!(payload["data"]["step_id"], "opening");
        assert!(payload["message"].as_str().unwrap_or_default().contains("opening"));
    });
}

#[test]
fn quote_rejects_dimensions_below_minimum() {
    let workspace = Workspace::new();
    with_env(&[("WINQUOTE_CATALOG_URL", workspace.database_url().as_str())], || {
        let mut args = quote_args(&[]);
        args.width = Some(Decimal::from(20));
        let result = quote::run(&LoadOptions::default(), args);
        assert_eq!(result.exit_code, 5);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["data"]["step_id"], "dimensions");
    });
}

#[test]
fn quote_back_steps_behind_the_completed_wizard() {
    let workspace = Workspace::new();
    with_env(&[("WINQUOTE_CATALOG_URL", workspace.database_url().as_str())], || {
        let mut args =
            quote_args(&["material=alu", "opening=fixed", "glass=triple", "color=anthracite"]);
        args.back = 2;
        let result = quote::run(&LoadOptions::default(), args);
        assert_eq!(result.exit_code, 0, "{}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["data"]["step_id"], "opening");
        let selected = payload["data"]["lines"]
            .as_array()
            .map(|lines| lines.iter().filter(|line| !line["selected"].is_null()).count())
            .unwrap_or_default();
        assert_eq!(selected, 4, "retreating keeps every selection");
    });
}

#[test]
fn quote_with_oversized_dimensions_still_prints_a_status_line() {
    let workspace = Workspace::new();
    with_env(&[("WINQUOTE_CATALOG_URL", workspace.database_url().as_str())], || {
        let mut args =
            quote_args(&["material=alu-wood", "opening=scorrevole", "glass=triple", "color=oak"]);
        args.width = Some(Decimal::from(100_000_000_000_000_000_i64));
        args.height = Some(Decimal::from(100_000_000_000_000_i64));
        let result = quote::run(&LoadOptions::default(), args);
        assert_eq!(result.exit_code, 0, "{}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "ok");
        assert!(payload["message"].as_str().unwrap_or_default().ends_with(" EUR"));
    });
}

#[test]
fn quote_reports_unknown_option_and_category() {
    let workspace = Workspace::new();
    with_env(&[("WINQUOTE_CATALOG_URL", workspace.database_url().as_str())], || {
        let result = quote::run(&LoadOptions::default(), quote_args(&["glass=stained"]));
        assert_eq!(result.exit_code, 10);
        assert_eq!(parse_payload(&result.output)["error_class"], "option_not_found");

        let result = quote::run(&LoadOptions::default(), quote_args(&["roofing=slate"]));
        assert_eq!(result.exit_code, 6);
        assert_eq!(parse_payload(&result.output)["error_class"], "catalog_not_found");

        let result = quote::run(&LoadOptions::default(), quote_args(&["material"]));
        assert_eq!(result.exit_code, 5);
    });
}

#[test]
fn catalog_show_lists_defaults_and_rejects_unknown_category() {
    let workspace = Workspace::new();
    with_env(&[("WINQUOTE_CATALOG_URL", workspace.database_url().as_str())], || {
        let result = catalog::show(&LoadOptions::default(), None);
        assert_eq!(result.exit_code, 0);
        let payload = parse_payload(&result.output);
        assert_eq!(payload["message"], "4 categories, 0 imported options");
        assert!(payload["data"]["glass"]["options"].is_array());

        let result = catalog::show(&LoadOptions::default(), Some("opening"));
        assert_eq!(result.exit_code, 0);
        assert_eq!(parse_payload(&result.output)["data"]["id"], "opening");

        let result = catalog::show(&LoadOptions::default(), Some("roofing"));
        assert_eq!(result.exit_code, 6);
        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "catalog_not_found");
        assert!(payload["correlation_id"].is_string());
    });
}

#[test]
fn catalog_import_rejects_non_pdf_before_calling_extractor() {
    let workspace = Workspace::new();
    let notes = workspace.write("notes.txt", b"artCode;weight\n");
    with_env(&[("WINQUOTE_CATALOG_URL", workspace.database_url().as_str())], || {
        let result = catalog::import(&LoadOptions::default(), &notes, None);
        assert_eq!(result.exit_code, 7, "expected import input failure");
        assert_eq!(parse_payload(&result.output)["error_class"], "import_input");
    });
}

#[test]
fn catalog_import_reports_unreadable_file_as_input_error() {
    let workspace = Workspace::new();
    let missing = workspace.path().join("missing.pdf");
    with_env(&[("WINQUOTE_CATALOG_URL", workspace.database_url().as_str())], || {
        let result = catalog::import(&LoadOptions::default(), &missing, None);
        assert_eq!(result.exit_code, 7);
        let payload = parse_payload(&result.output);
        assert!(payload["message"].as_str().unwrap_or_default().contains("missing.pdf"));
    });
}

#[test]
fn catalog_import_rejects_file_over_the_size_limit() {
    let workspace = Workspace::new();
    let mut bytes = b"%PDF-1.7\n".to_vec();
    bytes.resize(2 * 1024 * 1024, b' ');
    let pdf = workspace.write("listino.pdf", &bytes);
    with_env(
        &[
            ("WINQUOTE_CATALOG_URL", workspace.database_url().as_str()),
            ("WINQUOTE_EXTRACTION_MAX_FILE_MB", "1"),
            ("WINQUOTE_EXTRACTION_API_KEY", "test-key-0123456789"),
        ],
        || {
            let result = catalog::import(&LoadOptions::default(), &pdf, None);
            assert_eq!(result.exit_code, 7, "expected import input failure: {}", result.output);
            let payload = parse_payload(&result.output);
            assert_eq!(payload["error_class"], "import_input");
            assert!(payload["message"].as_str().unwrap_or_default().contains("limit is 1048576"));
            assert!(!workspace.path().join("winquote.db").exists(), "rejected before any io");
        },
    );
}

#[test]
fn catalog_import_without_api_key_is_an_extraction_failure() {
    let workspace = Workspace::new();
    let pdf = workspace.write("listino.pdf", b"%PDF-1.7\n%fake\n");
    with_env(&[("WINQUOTE_CATALOG_URL", workspace.database_url().as_str())], || {
        let result = catalog::import(&LoadOptions::default(), &pdf, None);
        assert_eq!(result.exit_code, 8, "expected extraction failure: {}", result.output);
        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "extraction");
        assert!(payload["message"].as_str().unwrap_or_default().contains("API key"));
    });
}

#[test]
fn catalog_import_merges_extracted_profiles_and_persists_them() {
    let workspace = Workspace::new();
    let pdf = workspace.write("listino.pdf", b"%PDF-1.7\n%fake\n");
    let items = serde_json::json!({
        "items": [
            {"artCode": "PT 100", "description": "Telaio", "weight": 900.0, "type": "frame"},
            {"artCode": "PA 3001", "description": "Anta", "weight": 1200.0, "type": "sash"},
            {"artCode": "GU 7", "description": "Guarnizione", "weight": 40.0, "type": "other"}
        ]
    });
    let envelope = serde_json::json!({
        "candidates": [{"content": {"parts": [{"text": items.to_string()}]}}]
    });
    let base_url = serve_once(envelope.to_string());

    let database_url = workspace.database_url();
    with_env(
        &[
            ("WINQUOTE_CATALOG_URL", database_url.as_str()),
            ("WINQUOTE_EXTRACTION_API_KEY", "test-key-0123456789"),
            ("WINQUOTE_EXTRACTION_BASE_URL", base_url.as_str()),
        ],
        || {
            let result = catalog::import(&LoadOptions::default(), &pdf, None);
            assert_eq!(result.exit_code, 0, "expected successful import: {}", result.output);
            let payload = parse_payload(&result.output);
            assert_eq!(payload["data"]["frames_merged"], 1);
            assert_eq!(payload["data"]["sashes_merged"], 1);
            assert_eq!(payload["data"]["rows_dropped"], 1);

            let result = catalog::show(&LoadOptions::default(), Some("opening"));
            let payload = parse_payload(&result.output);
            assert_eq!(payload["data"]["options"][0]["code"], "PA 3001");

            let result =
                quote::run(&LoadOptions::default(), quote_args(&["material=pt-100", "opening=pa-3001"]));
            assert_eq!(result.exit_code, 5, "glass is still missing");
            assert_eq!(parse_payload(&result.output)["data"]["step_id"], "glass");
        },
    );
}

#[test]
fn catalog_reset_requires_confirmation() {
    let workspace = Workspace::new();
    with_env(&[("WINQUOTE_CATALOG_URL", workspace.database_url().as_str())], || {
        let result = catalog::reset(&LoadOptions::default(), false);
        assert_eq!(result.exit_code, 11);
        assert_eq!(parse_payload(&result.output)["error_class"], "confirmation_required");
        assert!(!workspace.path().join("winquote.db").exists(), "nothing was touched");

        let result = catalog::reset(&LoadOptions::default(), true);
        assert_eq!(result.exit_code, 0);
        assert_eq!(
            parse_payload(&result.output)["message"],
            "catalog restored to defaults, 0 imported options discarded"
        );
    });
}

#[test]
fn catalog_reset_discards_imported_profiles() {
    let workspace = Workspace::new();
    let pdf = workspace.write("listino.pdf", b"%PDF-1.7\n%fake\n");
    let items = serde_json::json!({
        "items": [
            {"artCode": "PT 100", "description": "Telaio", "weight": 900.0, "type": "frame"},
            {"artCode": "PT 200", "description": "Telaio rinforzato", "weight": 1100.0, "type": "frame"}
        ]
    });
    let envelope = serde_json::json!({
        "candidates": [{"content": {"parts": [{"text": items.to_string()}]}}]
    });
    let base_url = serve_once(envelope.to_string());

    let database_url = workspace.database_url();
    with_env(
        &[
            ("WINQUOTE_CATALOG_URL", database_url.as_str()),
            ("WINQUOTE_EXTRACTION_API_KEY", "test-key-0123456789"),
            ("WINQUOTE_EXTRACTION_BASE_URL", base_url.as_str()),
        ],
        || {
            let result = catalog::import(&LoadOptions::default(), &pdf, None);
            assert_eq!(result.exit_code, 0, "expected successful import: {}", result.output);

            let result = catalog::reset(&LoadOptions::default(), true);
            assert_eq!(result.exit_code, 0);
            assert_eq!(
                parse_payload(&result.output)["message"],
                "catalog restored to defaults, 2 imported options discarded"
            );

            let result = catalog::show(&LoadOptions::default(), Some("material"));
            assert_eq!(result.exit_code, 0);
            let payload = parse_payload(&result.output);
            let options = payload["data"]["options"].as_array().cloned().unwrap_or_default();
            let ids: Vec<&str> = options.iter().filter_map(|option| option["id"].as_str()).collect();
            assert_eq!(ids, vec!["pvc", "wood", "alu", "alu-wood"]);
            assert!(options.iter().all(|option| option.get("code").is_none()));
        },
    );
}

#[test]
fn invalid_config_fails_every_command_with_config_code() {
    let workspace = Workspace::new();
    with_env(
        &[
            ("WINQUOTE_CATALOG_URL", workspace.database_url().as_str()),
            ("WINQUOTE_EXTRACTION_TIMEOUT_SECS", "0"),
        ],
        || {
            let result = quote::run(&LoadOptions::default(), quote_args(&[]));
            assert_eq!(result.exit_code, 2);
            assert_eq!(parse_payload(&result.output)["error_class"], "config_validation");

            let result = catalog::show(&LoadOptions::default(), None);
            assert_eq!(result.exit_code, 2);

            let result = config::run(&LoadOptions::default());
            assert_eq!(result.exit_code, 2);
        },
    );
}

#[test]
fn config_reports_sources_and_redacts_api_key() {
    let workspace = Workspace::new();
    let config_path = workspace.write(
        "winquote.toml",
        b"[extraction]\nmodel = \"gemini-1.5-pro\"\n\n[logging]\nformat = \"json\"\n",
    );
    with_env(
        &[
            ("WINQUOTE_CATALOG_URL", workspace.database_url().as_str()),
            ("GEMINI_API_KEY", "AIzaSyD-very-secret-value"),
        ],
        || {
            let options = LoadOptions { config_path: Some(config_path.clone()), ..LoadOptions::default() };
            let result = config::run(&options);
            assert_eq!(result.exit_code, 0, "{}", result.output);

            let output = result.output;
            assert!(output.contains("- catalog.url = sqlite://"));
            assert!(output.contains("(source: env (WINQUOTE_CATALOG_URL))"));
            assert!(output.contains("- extraction.model = gemini-1.5-pro (source: file ("));
            assert!(output.contains("- extraction.api_key = AIza*** (source: env (GEMINI_API_KEY))"));
            assert!(output.contains("- logging.format = json"));
            assert!(output.contains("- catalog.timeout_secs = 30 (source: default)"));
            assert!(!output.contains("very-secret"));
        },
    );
}

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self { dir: TempDir::new().expect("tempdir") }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn database_url(&self) -> String {
        format!("sqlite://{}", self.path().join("winquote.db").display())
    }

    fn write(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.path().join(name);
        std::fs::write(&path, contents).expect("write fixture");
        path
    }
}

fn quote_args(selections: &[&str]) -> QuoteArgs {
    QuoteArgs {
        width: Some(Decimal::from(120)),
        height: Some(Decimal::from(140)),
        selections: selections.iter().map(|entry| entry.to_string()).collect(),
        back: 0,
    }
}

/// Answers one HTTP request with `body` and returns the base URL to reach it.
fn serve_once(body: String) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let address = listener.local_addr().expect("addr");
    thread::spawn(move || {
        let (mut socket, _) = listener.accept().expect("accept");
        let mut received = Vec::new();
        let mut buffer = [0_u8; 8192];
        loop {
            let read = socket.read(&mut buffer).expect("read");
            received.extend_from_slice(&buffer[..read]);
            let text = String::from_utf8_lossy(&received);
            if let Some(split) = text.find("\r\n\r\n") {
                let length = text[..split]
                    .lines()
                    .find_map(|line| {
                        line.to_ascii_lowercase()
                            .strip_prefix("content-length:")
                            .map(|value| value.trim().parse::<usize>().unwrap_or(0))
                    })
                    .unwrap_or(0);
                if received.len() >= split + 4 + length {
                    break;
                }
            }
            if read == 0 {
                break;
            }
        }
        let reply = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\n\
             content-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(reply.as_bytes()).expect("write");
    });
    format!("http://{address}")
}

fn with_env<F>(vars: &[(&str, &str)], test: F)
where
    F: FnOnce(),
{
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let lock = ENV_LOCK.get_or_init(|| Mutex::new(()));
    let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

    let saved: Vec<(String, Option<String>)> =
        MANAGED_KEYS.iter().map(|key| (key.to_string(), env::var(key).ok())).collect();

    for key in MANAGED_KEYS {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test();

    for (key, value) in saved {
        match value {
            Some(value) => env::set_var(&key, value),
            None => env::remove_var(&key),
        }
    }
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid json")
}
