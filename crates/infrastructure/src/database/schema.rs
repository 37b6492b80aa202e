//! 表结构定义，PostgreSQL 与 SQLite 各一份

pub const POSTGRES_SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS elastic_scaling_strategies (
        id BIGSERIAL PRIMARY KEY,
        name VARCHAR(255) NOT NULL,
        description TEXT,
        trigger_action VARCHAR(32) NOT NULL,
        cpu_threshold_value DOUBLE PRECISION,
        cpu_threshold_type VARCHAR(32),
        cpu_target_value DOUBLE PRECISION,
        memory_threshold_value DOUBLE PRECISION,
        memory_threshold_type VARCHAR(32),
        memory_target_value DOUBLE PRECISION,
        condition_logic VARCHAR(8) NOT NULL DEFAULT 'AND',
        resource_types VARCHAR(255) NOT NULL DEFAULT 'total',
        device_count INTEGER NOT NULL DEFAULT 1,
        duration_minutes BIGINT NOT NULL DEFAULT 1440,
        cooldown_minutes BIGINT NOT NULL DEFAULT 60,
        status VARCHAR(32) NOT NULL DEFAULT 'enabled',
        entry_query_template_id BIGINT,
        exit_query_template_id BIGINT,
        created_by VARCHAR(255) NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS strategy_cluster_relations (
        id BIGSERIAL PRIMARY KEY,
        strategy_id BIGINT NOT NULL REFERENCES elastic_scaling_strategies(id) ON DELETE CASCADE,
        cluster_id BIGINT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        UNIQUE (strategy_id, cluster_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS resource_snapshots (
        id BIGSERIAL PRIMARY KEY,
        cluster_id BIGINT NOT NULL,
        resource_type VARCHAR(64) NOT NULL,
        cpu_capacity DOUBLE PRECISION NOT NULL DEFAULT 0,
        cpu_request DOUBLE PRECISION NOT NULL DEFAULT 0,
        max_cpu_usage_ratio DOUBLE PRECISION NOT NULL DEFAULT 0,
        memory_capacity DOUBLE PRECISION NOT NULL DEFAULT 0,
        memory_request DOUBLE PRECISION NOT NULL DEFAULT 0,
        max_memory_usage_ratio DOUBLE PRECISION NOT NULL DEFAULT 0,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS strategy_execution_history (
        id BIGSERIAL PRIMARY KEY,
        strategy_id BIGINT NOT NULL,
        cluster_id BIGINT,
        resource_type VARCHAR(64),
        execution_time TIMESTAMPTZ NOT NULL,
        triggered_value TEXT NOT NULL DEFAULT '',
        threshold_value TEXT NOT NULL DEFAULT '',
        result VARCHAR(64) NOT NULL,
        order_id BIGINT,
        reason TEXT NOT NULL DEFAULT '',
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS orders (
        id BIGSERIAL PRIMARY KEY,
        order_number VARCHAR(64) NOT NULL UNIQUE,
        name VARCHAR(255) NOT NULL,
        description TEXT,
        order_type VARCHAR(32) NOT NULL,
        status VARCHAR(32) NOT NULL,
        executor VARCHAR(255),
        execution_time TIMESTAMPTZ,
        completion_time TIMESTAMPTZ,
        failure_reason TEXT,
        created_by VARCHAR(255) NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS elastic_scaling_order_details (
        id BIGSERIAL PRIMARY KEY,
        order_id BIGINT NOT NULL UNIQUE REFERENCES orders(id) ON DELETE CASCADE,
        cluster_id BIGINT,
        strategy_id BIGINT,
        action_type VARCHAR(64) NOT NULL,
        resource_type VARCHAR(64),
        device_count INTEGER NOT NULL DEFAULT 0,
        triggered_value TEXT,
        threshold_value TEXT,
        maintenance_start TIMESTAMPTZ,
        maintenance_end TIMESTAMPTZ,
        external_ticket_id VARCHAR(255),
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS order_devices (
        id BIGSERIAL PRIMARY KEY,
        order_id BIGINT NOT NULL REFERENCES orders(id) ON DELETE CASCADE,
        device_id BIGINT NOT NULL,
        status VARCHAR(32) NOT NULL DEFAULT 'pending',
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        UNIQUE (order_id, device_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS query_templates (
        id BIGSERIAL PRIMARY KEY,
        name VARCHAR(255) NOT NULL,
        filter_groups TEXT NOT NULL DEFAULT '[]',
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_strategies_status ON elastic_scaling_strategies(status)",
    "CREATE INDEX IF NOT EXISTS idx_snapshots_cluster_type_time ON resource_snapshots(cluster_id, resource_type, created_at)",
    "CREATE INDEX IF NOT EXISTS idx_history_strategy_time ON strategy_execution_history(strategy_id, execution_time)",
    "CREATE INDEX IF NOT EXISTS idx_order_details_ticket ON elastic_scaling_order_details(external_ticket_id)",
    "CREATE INDEX IF NOT EXISTS idx_order_devices_order ON order_devices(order_id)",
];

pub const SQLITE_SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS elastic_scaling_strategies (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        description TEXT,
        trigger_action TEXT NOT NULL,
        cpu_threshold_value REAL,
        cpu_threshold_type TEXT,
        cpu_target_value REAL,
        memory_threshold_value REAL,
        memory_threshold_type TEXT,
        memory_target_value REAL,
        condition_logic TEXT NOT NULL DEFAULT 'AND',
        resource_types TEXT NOT NULL DEFAULT 'total',
        device_count INTEGER NOT NULL DEFAULT 1,
        duration_minutes INTEGER NOT NULL DEFAULT 1440,
        cooldown_minutes INTEGER NOT NULL DEFAULT 60,
        status TEXT NOT NULL DEFAULT 'enabled',
        entry_query_template_id INTEGER,
        exit_query_template_id INTEGER,
        created_by TEXT NOT NULL,
        created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS strategy_cluster_relations (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        strategy_id INTEGER NOT NULL,
        cluster_id INTEGER NOT NULL,
        created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
        UNIQUE (strategy_id, cluster_id),
        FOREIGN KEY (strategy_id) REFERENCES elastic_scaling_strategies(id) ON DELETE CASCADE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS resource_snapshots (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        cluster_id INTEGER NOT NULL,
        resource_type TEXT NOT NULL,
        cpu_capacity REAL NOT NULL DEFAULT 0,
        cpu_request REAL NOT NULL DEFAULT 0,
        max_cpu_usage_ratio REAL NOT NULL DEFAULT 0,
        memory_capacity REAL NOT NULL DEFAULT 0,
        memory_request REAL NOT NULL DEFAULT 0,
        max_memory_usage_ratio REAL NOT NULL DEFAULT 0,
        created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS strategy_execution_history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        strategy_id INTEGER NOT NULL,
        cluster_id INTEGER,
        resource_type TEXT,
        execution_time DATETIME NOT NULL,
        triggered_value TEXT NOT NULL DEFAULT '',
        threshold_value TEXT NOT NULL DEFAULT '',
        result TEXT NOT NULL,
        order_id INTEGER,
        reason TEXT NOT NULL DEFAULT '',
        created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS orders (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        order_number TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL,
        description TEXT,
        order_type TEXT NOT NULL,
        status TEXT NOT NULL,
        executor TEXT,
        execution_time DATETIME,
        completion_time DATETIME,
        failure_reason TEXT,
        created_by TEXT NOT NULL,
        created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS elastic_scaling_order_details (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        order_id INTEGER NOT NULL UNIQUE,
        cluster_id INTEGER,
        strategy_id INTEGER,
        action_type TEXT NOT NULL,
        resource_type TEXT,
        device_count INTEGER NOT NULL DEFAULT 0,
        triggered_value TEXT,
        threshold_value TEXT,
        maintenance_start DATETIME,
        maintenance_end DATETIME,
        external_ticket_id TEXT,
        created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
        FOREIGN KEY (order_id) REFERENCES orders(id) ON DELETE CASCADE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS order_devices (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        order_id INTEGER NOT NULL,
        device_id INTEGER NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending',
        created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
        UNIQUE (order_id, device_id),
        FOREIGN KEY (order_id) REFERENCES orders(id) ON DELETE CASCADE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS query_templates (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        filter_groups TEXT NOT NULL DEFAULT '[]',
        created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_strategies_status ON elastic_scaling_strategies(status)",
    "CREATE INDEX IF NOT EXISTS idx_snapshots_cluster_type_time ON resource_snapshots(cluster_id, resource_type, created_at)",
    "CREATE INDEX IF NOT EXISTS idx_history_strategy_time ON strategy_execution_history(strategy_id, execution_time)",
    "CREATE INDEX IF NOT EXISTS idx_order_details_ticket ON elastic_scaling_order_details(external_ticket_id)",
    "CREATE INDEX IF NOT EXISTS idx_order_devices_order ON order_devices(order_id)",
];
