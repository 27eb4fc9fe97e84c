use super::*;

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());

    let overrides = ServeOverrides {
        server_port: Some(4321),
        logging: LoggingOverrides {
            log_level: Some("debug".to_string()),
            log_json: None,
        },
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
}

#[test]
fn defaults_match_the_stock_deployment() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.server.addr.port(), DEFAULT_PORT);
    assert_eq!(settings.uploads.max_request_bytes.get(), 10 * 1024 * 1024);
    assert_eq!(settings.uploads.max_avatar_bytes.get(), 5 * 1024 * 1024);
    assert_eq!(settings.rate_limit.window_seconds.get(), 900);
    assert_eq!(settings.rate_limit.max_requests.get(), 100);
    assert_eq!(settings.auth.token_ttl, Duration::from_secs(24 * 3600));
    assert!(settings.auth.jwt_secret.is_none());
    assert!(settings.admin.token.is_none());
    assert!(settings.database.init_on_start);
    assert!(settings.database.seed_test_data);
    assert_eq!(settings.offline.generation, CURRENT_GENERATION);
    assert_eq!(settings.offline.upstream.as_str(), "http://127.0.0.1:3000/");
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        logging: LoggingOverrides {
            log_level: None,
            log_json: Some(true),
        },
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn short_jwt_secrets_are_rejected() {
    let mut raw = RawSettings::default();
    raw.auth.jwt_secret = Some("short".to_string());

    let err = Settings::from_raw(raw).expect_err("secret too short");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "auth.jwt_secret",
            ..
        }
    ));
}

#[test]
fn blank_tokens_count_as_unset() {
    let mut raw = RawSettings::default();
    raw.admin.token = Some("   ".to_string());
    raw.auth.jwt_secret = Some(String::new());

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(settings.admin.token.is_none());
    assert!(settings.auth.jwt_secret.is_none());
}

#[test]
fn request_limit_cannot_undercut_avatar_limit() {
    let mut raw = RawSettings::default();
    raw.uploads.max_avatar_bytes = Some(2048);
    raw.uploads.max_request_bytes = Some(1024);

    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn zero_rate_limit_is_rejected() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        rate_limit_max_requests: Some(0),
        ..Default::default()
    };
    raw.apply_serve_overrides(&overrides);

    let err = Settings::from_raw(raw).expect_err("zero rate limit");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "rate_limit.max_requests",
            ..
        }
    ));
}

#[test]
fn offline_upstream_must_be_http() {
    let mut raw = RawSettings::default();
    raw.offline.upstream = Some("ftp://example.com".to_string());
    assert!(Settings::from_raw(raw).is_err());

    let mut raw = RawSettings::default();
    raw.offline.generation = Some("v2/../..".to_string());
    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn offline_overrides_apply() {
    let mut raw = RawSettings::default();
    raw.apply_offline_overrides(&OfflineOverrides {
        host: Some("0.0.0.0".to_string()),
        port: Some(8080),
        upstream: Some("https://todo.example.com".to_string()),
        storage_dir: Some(PathBuf::from("/var/lib/todolist")),
    });

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.offline.addr.to_string(), "0.0.0.0:8080");
    assert_eq!(settings.offline.upstream.host_str(), Some("todo.example.com"));
    assert_eq!(
        settings.offline.storage_dir,
        PathBuf::from("/var/lib/todolist")
    );
}

#[test]
fn skip_database_init_disables_bootstrap() {
    let mut raw = RawSettings::default();
    raw.apply_serve_overrides(&ServeOverrides {
        skip_database_init: true,
        ..Default::default()
    });

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(!settings.database.init_on_start);
}

#[test]
fn default_to_no_command() {
    let args = CliArgs::parse_from(["todolist"]);
    assert!(args.command.is_none());
}

#[test]
fn parse_serve_overrides() {
    let args = CliArgs::parse_from([
        "todolist",
        "serve",
        "--server-port",
        "8081",
        "--database-url",
        "postgres://example",
        "--log-json",
        "true",
        "--skip-database-init",
    ]);

    match args.command.expect("serve command") {
        Command::Serve(serve) => {
            assert_eq!(serve.overrides.server_port, Some(8081));
            assert_eq!(
                serve.overrides.database.database_url.as_deref(),
                Some("postgres://example")
            );
            assert_eq!(serve.overrides.logging.log_json, Some(true));
            assert!(serve.overrides.skip_database_init);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn parse_database_init_arguments() {
    let args = CliArgs::parse_from([
        "todolist",
        "database",
        "init",
        "--database-url",
        "postgres://example",
        "--drop-existing",
        "--no-test-data",
    ]);

    match args.command.expect("database command") {
        Command::Database(DatabaseArgs {
            command: DatabaseCommand::Init(init),
        }) => {
            assert!(init.drop_existing);
            assert!(init.no_test_data);
            assert_eq!(
                init.database.database_url.as_deref(),
                Some("postgres://example")
            );
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn parse_offline_arguments() {
    let args = CliArgs::parse_from([
        "todolist",
        "offline",
        "--offline-port",
        "3200",
        "--upstream",
        "http://10.0.0.2:3000",
        "--storage-dir",
        "/tmp/offline",
    ]);

    match args.command.expect("offline command") {
        Command::Offline(offline) => {
            assert_eq!(offline.overrides.port, Some(3200));
            assert_eq!(
                offline.overrides.upstream.as_deref(),
                Some("http://10.0.0.2:3000")
            );
            assert_eq!(
                offline.overrides.storage_dir,
                Some(PathBuf::from("/tmp/offline"))
            );
        }
        other => panic!("unexpected command: {other:?}"),
    }
}
