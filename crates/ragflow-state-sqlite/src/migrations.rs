/// Generate SQL migrations for the SQLite state store
///
/// Every entry holds exactly one statement. All statements are idempotent and
/// are applied in order on every startup.
pub fn generate_migrations() -> Vec<(&'static str, &'static str)> {
    vec![
        (
            "20240501000000_workflow_instances",
            r#"
            CREATE TABLE IF NOT EXISTS workflow_instances (
                id TEXT PRIMARY KEY,
                workflow TEXT NOT NULL,
                trigger_id TEXT NOT NULL,
                status TEXT NOT NULL,
                data TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        ),
        (
            "20240501000001_workflow_instances_trigger_index",
            "CREATE INDEX IF NOT EXISTS idx_workflow_instances_trigger ON workflow_instances(trigger_id)",
        ),
        (
            "20240501000002_workflow_instances_status_index",
            "CREATE INDEX IF NOT EXISTS idx_workflow_instances_status ON workflow_instances(status)",
        ),
        (
            "20240501000003_step_records",
            r#"
            CREATE TABLE IF NOT EXISTS step_records (
                instance_id TEXT NOT NULL,
                step_name TEXT NOT NULL,
                seq INTEGER NOT NULL,
                state TEXT NOT NULL,
                completed_at TEXT,
                PRIMARY KEY (instance_id, step_name)
            )
            "#,
        ),
        (
            "20240501000004_timers",
            r#"
            CREATE TABLE IF NOT EXISTS timers (
                timer_id TEXT PRIMARY KEY,
                instance_id TEXT NOT NULL,
                step_name TEXT NOT NULL,
                wake_at TEXT NOT NULL,
                wake_at_ms INTEGER NOT NULL
            )
            "#,
        ),
        (
            "20240501000005_timers_wake_index",
            "CREATE INDEX IF NOT EXISTS idx_timers_wake_at ON timers(wake_at_ms)",
        ),
    ]
}
