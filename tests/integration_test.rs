//! Integration tests for granary

use granary::config::Config;
use granary::pipeline::Pipeline;

mod config_tests {
    use super::*;

    #[test]
    fn test_config_yaml_parsing() {
        let yaml = r#"
database:
  host: cluster.example.us-west-2.redshift.amazonaws.com
  port: 5440
  dbname: warehouse
  user: loader
  password: secret

storage:
  log_data_uri: s3://bucket/log_data
  song_data_uri: s3://bucket/song_data
  log_jsonpath: s3://bucket/log_json_path.json
  iam_role: arn:aws:iam::000000000000:role/warehouse-loader
  region: us-west-2
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.database.port, 5440);
        assert_eq!(config.database.dbname, "warehouse");
        assert_eq!(config.storage.region, "us-west-2");
    }

    #[test]
    fn test_config_port_default() {
        let yaml = r#"
database:
  host: localhost
  dbname: warehouse
  user: loader

storage:
  log_data_uri: s3://bucket/log_data
  song_data_uri: s3://bucket/song_data
  iam_role: arn:aws:iam::000000000000:role/warehouse-loader
  region: us-west-2
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.database.port, 5439);
        assert!(config.database.password.is_empty());
        assert!(config.storage.log_jsonpath.is_none());
    }

    #[test]
    fn test_config_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("granary.yaml");
        std::fs::write(
            &path,
            r#"
database:
  host: localhost
  dbname: warehouse
  user: loader

storage:
  log_data_uri: s3://bucket/log_data
  song_data_uri: s3://bucket/song_data
  iam_role: arn:aws:iam::000000000000:role/warehouse-loader
  region: us-west-2
"#,
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.database.host, "localhost");
    }

    #[test]
    fn test_config_rejects_missing_file() {
        let err = Config::from_file("/nonexistent/granary.yaml").unwrap_err();
        assert!(err.to_string().contains("read configuration file"));
    }
}

mod plan_tests {
    use super::*;

    fn pipeline() -> Pipeline {
        let yaml = r#"
database:
  host: localhost
  dbname: warehouse
  user: loader

storage:
  log_data_uri: s3://bucket/log_data
  song_data_uri: s3://bucket/song_data
  log_jsonpath: s3://bucket/log_json_path.json
  iam_role: arn:aws:iam::000000000000:role/warehouse-loader
  region: us-west-2
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        Pipeline::new(config)
    }

    /// Provisioning twice renders the identical statement plan: every drop
    /// and create is idempotent, so the second pass is a no-op against an
    /// already-provisioned warehouse.
    #[test]
    fn test_provision_plan_is_stable() {
        let pipeline = pipeline();
        let first: Vec<String> = pipeline
            .provision_plan()
            .iter()
            .map(|s| s.sql.clone())
            .collect();
        let second: Vec<String> = pipeline
            .provision_plan()
            .iter()
            .map(|s| s.sql.clone())
            .collect();
        assert_eq!(first, second);
        assert!(first.iter().all(|sql| sql.contains("IF EXISTS") || sql.contains("IF NOT EXISTS")));
    }

    /// The run sequence interleaves nothing: both copies, then the five
    /// derivations in dependency order, then the report queries.
    #[test]
    fn test_run_plan_sequences_phases() {
        let plan = pipeline().run_plan();
        let names: Vec<&str> = plan.iter().map(|s| s.name).collect();

        let copy_end = 2;
        let insert_end = 7;
        assert!(names[..copy_end].iter().all(|n| n.starts_with("copy:")));
        assert!(
            names[copy_end..insert_end]
                .iter()
                .all(|n| n.starts_with("insert:"))
        );
        assert!(
            names[insert_end..]
                .iter()
                .all(|n| n.starts_with("count:") || n.starts_with("insight:"))
        );

        // time derivation must come after the songplay load it reads from
        let songplays = names.iter().position(|n| *n == "insert:songplays").unwrap();
        let time = names.iter().position(|n| *n == "insert:time").unwrap();
        assert!(songplays < time);
    }

    /// Configured storage values land in the rendered copy statements and
    /// nowhere else.
    #[test]
    fn test_run_plan_parameterizes_copies() {
        let plan = pipeline().run_plan();
        let events = &plan[0];
        assert!(events.sql.contains("'s3://bucket/log_data'"));
        assert!(events.sql.contains("'s3://bucket/log_json_path.json'"));

        for statement in &plan[2..] {
            assert!(
                !statement.sql.contains("s3://"),
                "storage URI leaked into {}",
                statement.name
            );
        }
    }
}
