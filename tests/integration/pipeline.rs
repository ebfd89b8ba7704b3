use crate::helpers::fake::{FakeClusters, FakeDiffTool, fake_collaborators};
use crate::helpers::harness::{
    DEV, PROD, PROD_VERSION, TMP, captured_reporter, fake_clusters, schema_dump, test_config,
};
use crate::helpers::store::TestStore;
use anyhow::Result;
use pgmigrator::config::Config;
use pgmigrator::constants::{VERSION_GET_QUERY, version_set_statement};
use pgmigrator::error::MigratorError;
use pgmigrator::migrate::{MigrationOutcome, Migrator};
use pgmigrator::migration::{EntryKind, VersionCatalog, VersionLabel, signature};
use pgmigrator::transport::CommandKind;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

const USERS: &[&str] = &["id integer NOT NULL", "email text"];
const NOTE_DIFF: &str = "SET search_path = public, pg_catalog;\n\nALTER TABLE b ADD COLUMN note text;\n";

fn prod_dump() -> String {
    schema_dump(&[("users", USERS)])
}

fn after_a() -> String {
    schema_dump(&[("users", USERS), ("a", &["id integer"])])
}

fn after_b() -> String {
    schema_dump(&[("users", USERS), ("a", &["id integer"]), ("b", &["id integer"])])
}

fn dev_dump() -> String {
    schema_dump(&[
        ("users", USERS),
        ("a", &["id integer"]),
        ("b", &["id integer", "note text"]),
    ])
}

/// prod has `users`; two manual entries add `a` and `b`; dev also has
/// `b.note`, which only the diff provides
fn two_manual_entries_scenario() -> Result<(TestStore, Arc<FakeClusters>)> {
    let store = TestStore::new();
    store.add_manual("2020-02-01", "10_a.sql", "CREATE TABLE a (id integer);")?;
    store.add_manual("2020-02-02", "10_b.sql", "CREATE TABLE b (id integer);\n")?;

    let clusters = fake_clusters(&prod_dump(), &dev_dump());
    clusters.on_sql("CREATE TABLE a (id integer);", &after_a());
    clusters.on_sql("CREATE TABLE b (id integer);", &after_b());
    clusters.on_sql("ADD COLUMN note text", &dev_dump());
    Ok((store, clusters))
}

async fn run(
    config: &Config,
    clusters: &Arc<FakeClusters>,
    diff_tool: &Arc<FakeDiffTool>,
) -> (pgmigrator::error::Result<MigrationOutcome>, String, String) {
    let (reporter, out, err) = captured_reporter();
    let result = Migrator::new(config, fake_collaborators(clusters, diff_tool), &reporter)
        .execute()
        .await;
    (result, out.contents(), err.contents())
}

fn written(outcome: MigrationOutcome) -> (VersionLabel, PathBuf) {
    match outcome {
        MigrationOutcome::Written { label, path } => (label, path),
        other => panic!("expected a written migration, got {other:?}"),
    }
}

fn position(haystack: &str, needle: &str) -> usize {
    haystack
        .find(needle)
        .unwrap_or_else(|| panic!("{needle:?} not found in:\n{haystack}"))
}

mod generation_tests {
    use super::*;

    #[tokio::test]
    async fn test_manual_entries_and_diff_become_one_signed_migration() -> Result<()> {
        let (store, clusters) = two_manual_entries_scenario()?;
        let diff_tool = FakeDiffTool::returning(NOTE_DIFF);
        let config = test_config(store.path());

        let (result, out, _) = run(&config, &clusters, &diff_tool).await;
        let (label, path) = written(result?);

        assert_eq!(label.kind(), EntryKind::Generated);
        assert_eq!(path, store.path().join(label.as_str()).join("10_ddl.sql"));

        let artifact = fs::read_to_string(&path)?;
        assert!(signature::verify(&artifact));
        assert!(!artifact.contains('\r'));

        let body = artifact.split_once('\n').unwrap().1;
        assert!(body.starts_with("START TRANSACTION;\n\n"));
        assert!(body.ends_with("\nCOMMIT;"));

        let a = position(body, "-- Applying 2020-02-01/10_a.sql --");
        let b = position(body, "-- Applying 2020-02-02/10_b.sql --");
        let diff = position(body, "-- Applying generated <diff> --");
        let version = position(body, &version_set_statement(label.as_str()));
        assert!(a < b && b < diff && diff < version);

        assert!(body.contains("SET search_path = public, pg_catalog, \"$user\", public;"));
        assert!(out.contains(&format!("-- Version of 'prod': {}", PROD_VERSION)));
        assert!(out.contains("-- Versions to apply: 2020-02-01, 2020-02-02, <diff>"));
        assert!(out.contains(&format!("-- RESULT: {}", path.display())));
        Ok(())
    }

    #[tokio::test]
    async fn test_only_scratch_database_is_written() -> Result<()> {
        let (store, clusters) = two_manual_entries_scenario()?;
        let diff_tool = FakeDiffTool::returning(NOTE_DIFF);
        let config = test_config(store.path());

        let (result, _, _) = run(&config, &clusters, &diff_tool).await;
        result?;

        for cluster in [PROD, DEV] {
            for command in clusters.commands_on(cluster) {
                assert!(
                    matches!(command.kind, CommandKind::Dump { .. } | CommandKind::FetchCell),
                    "{cluster} received {:?}",
                    command.kind
                );
            }
        }
        assert_eq!(clusters.dump_of(PROD), Some(prod_dump()));
        assert_eq!(clusters.dump_of(TMP), Some(dev_dump()));
        Ok(())
    }

    #[tokio::test]
    async fn test_new_migration_supersedes_manual_entries() -> Result<()> {
        let (store, clusters) = two_manual_entries_scenario()?;
        let diff_tool = FakeDiffTool::returning(NOTE_DIFF);
        let config = test_config(store.path());

        let (result, _, _) = run(&config, &clusters, &diff_tool).await;
        let (label, _) = written(result?);

        let selected = VersionCatalog::scan(store.path())?.select_above(PROD_VERSION)?;
        let labels: Vec<&str> = selected.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec![label.as_str()]);
        Ok(())
    }

    #[tokio::test]
    async fn test_second_run_after_release_detects_no_changes() -> Result<()> {
        let (store, clusters) = two_manual_entries_scenario()?;
        let diff_tool = FakeDiffTool::returning(NOTE_DIFF);
        let config = test_config(store.path());

        let (result, _, _) = run(&config, &clusters, &diff_tool).await;
        let (label, _) = written(result?);

        // Release the migration to production.
        clusters.set_database(PROD, &dev_dump());
        clusters.set_cell(PROD, VERSION_GET_QUERY, label.as_str());
        let entries_before = store.entries();

        let (result, out, _) = run(&config, &clusters, &diff_tool).await;
        assert_eq!(result?, MigrationOutcome::NoChanges);
        assert_eq!(store.entries(), entries_before);
        assert!(out.contains("No changes detected"));
        Ok(())
    }

    #[tokio::test]
    async fn test_generated_entries_are_replayed_but_not_repeated() -> Result<()> {
        let store = TestStore::new();
        store.add_generated(
            "2020-01-15-10-00-00-mig",
            "START TRANSACTION;\n\nCREATE TABLE a (id integer);\nCOMMIT;",
        )?;
        let clusters = fake_clusters(&prod_dump(), &dev_dump());
        clusters.on_sql("CREATE TABLE a (id integer);", &after_a());
        clusters.on_sql("ADD COLUMN note text", &dev_dump());
        let diff_tool = FakeDiffTool::returning(
            "SET search_path = public, pg_catalog;\n\nCREATE TABLE b (id integer, note text);\nALTER TABLE b ADD COLUMN note text;\n",
        );
        let config = test_config(store.path());

        let (result, _, _) = run(&config, &clusters, &diff_tool).await;
        let (_, path) = written(result?);

        let artifact = fs::read_to_string(path)?;
        assert!(!artifact.contains("CREATE TABLE a"));
        assert!(!artifact.contains("2020-01-15-10-00-00-mig/10_ddl.sql"));
        assert!(artifact.contains("ALTER TABLE b ADD COLUMN note text"));

        // Generated artifacts bring their own transaction.
        let replayed = clusters
            .commands_on(TMP)
            .into_iter()
            .find(|c| {
                c.sql
                    .as_deref()
                    .is_some_and(|sql| sql.contains("-- Applying 2020-01-15-10-00-00-mig/10_ddl.sql --"))
            })
            .expect("generated entry replayed");
        assert_eq!(
            replayed.kind,
            CommandKind::ExecuteSql {
                single_transaction: false
            }
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_post_exec_runs_after_diff_and_closes_the_artifact() -> Result<()> {
        let (store, clusters) = two_manual_entries_scenario()?;
        let diff_tool = FakeDiffTool::returning(NOTE_DIFF);
        let mut config = test_config(store.path());
        config.generation.post_exec = Some("GRANT SELECT ON ALL TABLES IN SCHEMA public TO reader;".into());

        let (result, _, _) = run(&config, &clusters, &diff_tool).await;
        let (label, path) = written(result?);

        let artifact = fs::read_to_string(path)?;
        let version = position(&artifact, &version_set_statement(label.as_str()));
        let post = position(&artifact, "-- Applying post-SQL --");
        assert!(version < post);
        assert!(artifact.ends_with("TO reader;\nCOMMIT;"));

        let executed = clusters.executed_sql(TMP);
        assert!(executed.last().unwrap().contains("GRANT SELECT ON ALL TABLES"));
        Ok(())
    }

    #[tokio::test]
    async fn test_external_replication_leaves_session_and_transaction_alone() -> Result<()> {
        let (store, clusters) = two_manual_entries_scenario()?;
        let diff_tool = FakeDiffTool::returning(NOTE_DIFF);
        let mut config = test_config(store.path());
        config.generation.external_replication = true;

        let (result, _, _) = run(&config, &clusters, &diff_tool).await;
        let (_, path) = written(result?);

        let artifact = fs::read_to_string(path)?;
        assert!(signature::verify(&artifact));
        assert!(!artifact.contains("START TRANSACTION;"));
        assert!(!artifact.contains("COMMIT;"));
        assert!(!artifact.contains("\\set ON_ERROR_STOP"));
        Ok(())
    }

    #[tokio::test]
    async fn test_no_save_writes_outside_the_store() -> Result<()> {
        let (store, clusters) = two_manual_entries_scenario()?;
        let diff_tool = FakeDiffTool::returning(NOTE_DIFF);
        let mut config = test_config(store.path());
        config.store.no_save = true;
        let entries_before = store.entries();

        let (result, out, _) = run(&config, &clusters, &diff_tool).await;
        let path = match result? {
            MigrationOutcome::Unsaved { path, .. } => path,
            other => panic!("expected an unsaved migration, got {other:?}"),
        };

        assert!(!path.starts_with(store.path()));
        assert!(signature::verify(&fs::read_to_string(&path)?));
        assert_eq!(store.entries(), entries_before);
        assert!(out.contains("no-save mode"));
        fs::remove_file(path)?;
        Ok(())
    }

    #[tokio::test]
    async fn test_excluded_schemas_reach_every_dump() -> Result<()> {
        let (store, clusters) = two_manual_entries_scenario()?;
        let diff_tool = FakeDiffTool::returning(NOTE_DIFF);
        let mut config = test_config(store.path());
        config.generation.exclude_schemas = vec!["audit".to_string()];
        config.generation.with_data = true;

        let (result, _, _) = run(&config, &clusters, &diff_tool).await;
        result?;

        let dumps: Vec<CommandKind> = clusters
            .commands()
            .into_iter()
            .map(|c| c.kind)
            .filter(|k| matches!(k, CommandKind::Dump { .. }))
            .collect();
        // prod copy, scratch + dev for the diff, scratch for validation
        assert_eq!(dumps.len(), 4);
        for (i, kind) in dumps.iter().enumerate() {
            assert_eq!(
                kind,
                &CommandKind::Dump {
                    include_data: i == 0,
                    excluded_schemas: vec!["audit".to_string()],
                }
            );
        }
        Ok(())
    }
}

mod no_change_tests {
    use super::*;

    #[tokio::test]
    async fn test_identical_schemas_write_nothing() -> Result<()> {
        let store = TestStore::new();
        store.add_manual("2019-12-01", "10_old.sql", "CREATE TABLE old (id integer);")?;
        let clusters = fake_clusters(&prod_dump(), &prod_dump());
        let diff_tool = FakeDiffTool::returning(NOTE_DIFF);
        let config = test_config(store.path());

        let (result, out, _) = run(&config, &clusters, &diff_tool).await;

        assert_eq!(result?, MigrationOutcome::NoChanges);
        assert_eq!(store.entries(), vec!["2019-12-01".to_string()]);
        assert!(out.contains("-- Versions to apply: <diff>"));
        assert!(out.contains("No changes detected"));
        Ok(())
    }

    #[tokio::test]
    async fn test_dump_ordering_differences_validate() -> Result<()> {
        let store = TestStore::new();
        let reordered = schema_dump(&[("orders", &["id integer"]), ("users", USERS)]);
        let original = schema_dump(&[("users", USERS), ("orders", &["id integer"])]);
        let clusters = fake_clusters(&reordered, &original);
        // The diff tool compares structure, not text.
        let diff_tool = FakeDiffTool::returning("");
        let config = test_config(store.path());

        let (result, _, _) = run(&config, &clusters, &diff_tool).await;

        assert_eq!(result?, MigrationOutcome::NoChanges);
        assert_eq!(diff_tool.calls().len(), 1);
        Ok(())
    }
}

mod failure_tests {
    use super::*;

    #[tokio::test]
    async fn test_tampered_generated_entry_fails_before_any_dump() -> Result<()> {
        let (store, clusters) = two_manual_entries_scenario()?;
        let tampered = store.add_tampered("2020-01-20-00-00-00-mig", "CREATE TABLE t ();")?;
        let diff_tool = FakeDiffTool::returning(NOTE_DIFF);
        let config = test_config(store.path());
        let entries_before = store.entries();

        let (result, _, _) = run(&config, &clusters, &diff_tool).await;

        match result {
            Err(MigratorError::Signature { path }) => assert_eq!(path, tampered),
            other => panic!("expected a signature error, got {other:?}"),
        }
        assert_eq!(clusters.dump_count(), 0);
        assert!(clusters.commands_on(TMP).is_empty());
        assert_eq!(store.entries(), entries_before);
        Ok(())
    }

    #[tokio::test]
    async fn test_tampered_entry_below_version_is_ignored() -> Result<()> {
        let store = TestStore::new();
        store.add_tampered("2019-06-01-00-00-00-mig", "CREATE TABLE t ();")?;
        let clusters = fake_clusters(&prod_dump(), &prod_dump());
        let diff_tool = FakeDiffTool::returning("");
        let config = test_config(store.path());

        let (result, _, _) = run(&config, &clusters, &diff_tool).await;
        assert_eq!(result?, MigrationOutcome::NoChanges);
        Ok(())
    }

    #[tokio::test]
    async fn test_malformed_production_version() -> Result<()> {
        let store = TestStore::new();
        let clusters = fake_clusters(&prod_dump(), &dev_dump());
        clusters.set_cell(PROD, VERSION_GET_QUERY, "2020-01-01\n");
        let diff_tool = FakeDiffTool::returning(NOTE_DIFF);
        let config = test_config(store.path());

        let (result, _, _) = run(&config, &clusters, &diff_tool).await;

        match result {
            Err(MigratorError::InvalidVersion { version }) => assert_eq!(version, "2020-01-01"),
            other => panic!("expected an invalid version error, got {other:?}"),
        }
        assert_eq!(clusters.dump_count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_store_is_configuration_error() -> Result<()> {
        let store = TestStore::new();
        let clusters = fake_clusters(&prod_dump(), &dev_dump());
        let diff_tool = FakeDiffTool::returning(NOTE_DIFF);
        let config = test_config(&store.path().join("missing"));

        let (result, _, _) = run(&config, &clusters, &diff_tool).await;

        assert!(matches!(result, Err(MigratorError::Configuration { .. })));
        assert!(clusters.commands().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_sql_error_points_at_the_failing_line() -> Result<()> {
        let store = TestStore::new();
        store.add_manual("2020-02-01", "10_a.sql", "CREATE TABLE a (id integer);\nSELEC 1;")?;
        let clusters = fake_clusters(&prod_dump(), &dev_dump());
        // header, three preamble lines, then the file: SELEC is on line 6
        clusters.fail_on_sql(
            "SELEC 1;",
            "psql:/tmp/pgmigrator__tmp_shop.sql:6: ERROR:  syntax error at or near \"SELEC\"\n",
        );
        let diff_tool = FakeDiffTool::returning(NOTE_DIFF);
        let config = test_config(store.path());

        let (result, _, _) = run(&config, &clusters, &diff_tool).await;

        let err = result.unwrap_err();
        match &err {
            MigratorError::Execution {
                origin, context, ..
            } => {
                assert_eq!(origin.as_deref(), Some("2020-02-01/10_a.sql"));
                let context = context.as_ref().expect("line context");
                assert_eq!(context.line, 6);
                assert!(context.snippet.contains("/*00006*/ SELEC 1;"));
                assert!(context.snippet.ends_with("/*00007*/ -- ..."));
            }
            other => panic!("expected an execution error, got {other:?}"),
        }
        assert!(err.to_string().contains("### Line 6: ERROR:  syntax error"));
        assert!(store.entries() == vec!["2020-02-01".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn test_structure_mismatch_fails_validation() -> Result<()> {
        let (store, clusters) = two_manual_entries_scenario()?;
        // The diff lands somewhere other than dev.
        clusters.on_sql(
            "ADD COLUMN note text",
            &schema_dump(&[
                ("users", USERS),
                ("a", &["id integer"]),
                ("b", &["id integer", "note varchar"]),
            ]),
        );
        let diff_tool = FakeDiffTool::returning(NOTE_DIFF);
        let config = test_config(store.path());
        let entries_before = store.entries();

        let (result, _, _) = run(&config, &clusters, &diff_tool).await;

        match result {
            Err(MigratorError::Equivalence {
                raw_diff,
                fingerprint_diff,
            }) => {
                assert!(raw_diff.contains("note varchar"));
                assert!(raw_diff.contains("note text"));
                assert!(!fingerprint_diff.is_empty());
            }
            other => panic!("expected an equivalence error, got {other:?}"),
        }
        assert_eq!(store.entries(), entries_before);
        Ok(())
    }

    #[tokio::test]
    async fn test_diff_without_search_path_is_rejected() -> Result<()> {
        let (store, clusters) = two_manual_entries_scenario()?;
        let diff_tool = FakeDiffTool::returning("ALTER TABLE b ADD COLUMN note text;\n");
        let config = test_config(store.path());

        let (result, _, _) = run(&config, &clusters, &diff_tool).await;

        assert!(matches!(result, Err(MigratorError::DiffIntegrity { .. })));
        Ok(())
    }
}
