//! `waypost validate`: check a configuration file for errors.
//!
//! Parses and validates the config file, reporting results in either
//! human-readable text or machine-readable JSON format.

use crate::access::WhitelistEntry;
use crate::cli::{ValidateArgs, ValidateFormat};
use crate::config::sources::{extension_of, parse_config_str};
use crate::config::validation;
use crate::error::WaypostError;

pub fn execute(args: &ValidateArgs) -> Result<(), WaypostError> {
    let path = &args.config;

    if !path.exists() {
        return Err(WaypostError::ConfigFileNotFound { path: path.clone() });
    }

    let content = std::fs::read_to_string(path)?;

    let location = path.display().to_string();
    let config = parse_config_str(extension_of(&location), &content, &location)?;

    if let Err(errors) = validation::validate(&config) {
        match args.format {
            ValidateFormat::Text => {
                eprintln!("\u{2717} {} has {} errors\n", path.display(), errors.len());
                for error in &errors {
                    eprintln!("{error}");
                }
            }
            ValidateFormat::Json => {
                let json_errors: Vec<serde_json::Value> = errors
                    .iter()
                    .map(|e| {
                        serde_json::json!({
                            "route": e.route,
                            "field": e.field,
                            "message": e.message,
                            "suggestion": e.suggestion,
                        })
                    })
                    .collect();
                println!(
                    "{}",
                    serde_json::json!({
                        "valid": false,
                        "errors": json_errors,
                    })
                );
            }
        }
        return Err(WaypostError::ConfigValidation { errors });
    }

    let mut warnings: Vec<String> = validation::listen_warnings(&config)
        .into_iter()
        .map(String::from)
        .collect();
    warnings.extend(validation::cache_warnings(&config));
    warnings.extend(config.white_list.iter().filter_map(|entry| {
        matches!(WhitelistEntry::parse(entry), WhitelistEntry::Invalid(_))
            .then(|| format!("whitelist entry '{entry}' is neither an IP nor a CIDR block"))
    }));

    match args.format {
        ValidateFormat::Text => {
            println!(
                "\u{2713} {}",
                validation::format_validation_report(&location, &config)
            );
            for warning in &warnings {
                println!("  warning: {warning}");
            }
        }
        ValidateFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "valid": true,
                    "routes": config.routes.len(),
                    "backends": config.total_backends(),
                    "warnings": warnings,
                })
            );
        }
    }

    Ok(())
}
