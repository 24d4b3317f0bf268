//! `waypost init`: generate a starter configuration file.
//!
//! Writes a JSON or YAML config, either a single-route minimal template
//! or a full one exercising upstream groups, discovery, the whitelist,
//! CORS, and a static-file mount.

use std::path::PathBuf;

use crate::cli::{ConfigFormat, InitArgs};
use crate::error::WaypostError;

pub fn execute(args: &InitArgs) -> Result<(), WaypostError> {
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("waypost.{}", args.format.extension())));

    if output.exists() {
        return Err(WaypostError::FileExists { path: output });
    }

    std::fs::write(&output, template(&args.format, args.full))?;
    println!("Created {}", output.display());
    Ok(())
}

#[must_use]
pub const fn template(format: &ConfigFormat, full: bool) -> &'static str {
    match (format, full) {
        (ConfigFormat::Json, false) => JSON_MINIMAL,
        (ConfigFormat::Json, true) => JSON_FULL,
        (ConfigFormat::Yaml, false) => YAML_MINIMAL,
        (ConfigFormat::Yaml, true) => YAML_FULL,
    }
}

const JSON_MINIMAL: &str = r#"{
  "listen": ":8080",
  "routes": [
    {
      "path": "/api",
      "forwardUrl": "http://localhost:9000",
      "allowedMethods": ["GET", "POST"],
      "appendPath": true
    }
  ]
}
"#;

const JSON_FULL: &str = r#"{
  "listen": ":8080",
  "whiteList": ["127.0.0.1", "10.0.0.0/8"],
  "compression": true,
  "discovery": true,
  "upstreams": {
    "api": ["http://10.0.0.11:9000", "http://10.0.0.12:9000"]
  },
  "routes": [
    {
      "path": "/api/*rest",
      "forwardUrl": "api:/",
      "allowedMethods": ["GET", "POST", "PUT", "DELETE"],
      "appendPath": true,
      "forwardIp": true,
      "secureHeaders": true,
      "timeout": 5000,
      "customHeaders": {
        "X-Gateway": "waypost"
      },
      "cors": {
        "origin": "*",
        "methods": "GET,POST,PUT,DELETE",
        "maxAge": "600"
      }
    },
    {
      "path": "/users/:id",
      "forwardUrl": "users:",
      "allowedMethods": ["GET"],
      "appendPath": true,
      "discovery": true
    },
    {
      "path": "/static",
      "forwardUrl": "file://./public"
    }
  ]
}
"#;

const YAML_MINIMAL: &str = r#"# waypost config

listen: ":8080"
routes:
  - path: "/api"
    forwardUrl: "http://localhost:9000"
    allowedMethods: ["GET", "POST"]
    appendPath: true
"#;

const YAML_FULL: &str = r#"# waypost config
#
# listen:            host:port, ":port" binds every interface (default ":80")
# certificate / key: PEM files, both set to serve HTTPS
# log:               extra JSON log file
# whiteList:         caller IPs or CIDR blocks, empty allows everyone
# discovery:         enables POST /discovery and the heartbeat

listen: ":8080"
whiteList: ["127.0.0.1", "10.0.0.0/8"]
compression: true
discovery: true

upstreams:
  api: ["http://10.0.0.11:9000", "http://10.0.0.12:9000"]

routes:
  # Round robin over the "api" upstream group
  - path: "/api/*rest"
    forwardUrl: "api:/"
    allowedMethods: ["GET", "POST", "PUT", "DELETE"]
    appendPath: true
    forwardIp: true
    secureHeaders: true
    timeout: 5000           # ms
    customHeaders:
      X-Gateway: "waypost"
    cors:
      origin: "*"
      methods: "GET,POST,PUT,DELETE"
      maxAge: "600"

  # Instances of "users" register themselves with POST /discovery
  - path: "/users/:id"
    forwardUrl: "users:"
    allowedMethods: ["GET"]
    appendPath: true
    discovery: true

  # Static files
  - path: "/static"
    forwardUrl: "file://./public"
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::sources::parse_config_str;
    use crate::config::validation::validate;

    #[test]
    fn json_templates_are_valid() {
        for full in [false, true] {
            let config = parse_config_str("json", template(&ConfigFormat::Json, full), "init")
                .unwrap();
            assert!(validate(&config).is_ok(), "full={full}");
        }
    }

    #[cfg(feature = "yaml")]
    #[test]
    fn yaml_templates_are_valid() {
        for full in [false, true] {
            let config = parse_config_str("yaml", template(&ConfigFormat::Yaml, full), "init")
                .unwrap();
            assert!(validate(&config).is_ok(), "full={full}");
        }
    }

    #[test]
    fn refuses_to_overwrite() {
        let path = std::env::temp_dir().join(format!("waypost-init-{}.json", std::process::id()));
        std::fs::write(&path, "{}").unwrap();
        let args = InitArgs {
            format: ConfigFormat::Json,
            output: Some(path.clone()),
            full: false,
        };
        assert!(matches!(
            execute(&args),
            Err(WaypostError::FileExists { .. })
        ));
        std::fs::remove_file(path).unwrap();
    }
}
