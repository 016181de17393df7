//! Schema migrations
//!
//! Every statement is idempotent (`IF NOT EXISTS`), so the same schema can be
//! applied to both the offline and the online store at startup.

use sqlx::PgPool;

use super::Stores;

const SCHEMA: &[(&str, &str)] = &[
    (
        "warehouses",
        r#"
        CREATE TABLE IF NOT EXISTS warehouses (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            name TEXT NOT NULL,
            location TEXT,
            phone TEXT,
            is_deleted BOOLEAN NOT NULL DEFAULT FALSE,
            sync BOOLEAN NOT NULL DEFAULT FALSE,
            synced_at TIMESTAMPTZ,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "warehouses_name_live",
        "CREATE UNIQUE INDEX IF NOT EXISTS warehouses_name_live ON warehouses (lower(name)) WHERE NOT is_deleted",
    ),
    (
        "users",
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            warehouse_id UUID NOT NULL REFERENCES warehouses(id),
            username TEXT NOT NULL CHECK (username ~ '^[a-z0-9][a-z0-9._-]{2,31}$'),
            full_name TEXT NOT NULL,
            email TEXT,
            role TEXT NOT NULL CHECK (role IN ('admin', 'doctor', 'nurse', 'pharmacist', 'staff')),
            password_hash TEXT NOT NULL,
            is_deleted BOOLEAN NOT NULL DEFAULT FALSE,
            sync BOOLEAN NOT NULL DEFAULT FALSE,
            synced_at TIMESTAMPTZ,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "users_username_live",
        "CREATE UNIQUE INDEX IF NOT EXISTS users_username_live ON users (username) WHERE NOT is_deleted",
    ),
    (
        "students",
        r#"
        CREATE TABLE IF NOT EXISTS students (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            warehouse_id UUID NOT NULL REFERENCES warehouses(id),
            matric_number TEXT NOT NULL,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            gender TEXT CHECK (gender IN ('male', 'female', 'other')),
            date_of_birth DATE,
            phone TEXT,
            email TEXT,
            department TEXT,
            level TEXT,
            blood_group TEXT CHECK (blood_group IN ('A+', 'A-', 'B+', 'B-', 'AB+', 'AB-', 'O+', 'O-')),
            genotype TEXT CHECK (genotype IN ('AA', 'AS', 'AC', 'SS', 'SC', 'CC')),
            allergies TEXT,
            emergency_contact_name TEXT,
            emergency_contact_phone TEXT,
            address TEXT,
            is_deleted BOOLEAN NOT NULL DEFAULT FALSE,
            sync BOOLEAN NOT NULL DEFAULT FALSE,
            synced_at TIMESTAMPTZ,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "students_matric_live",
        "CREATE UNIQUE INDEX IF NOT EXISTS students_matric_live ON students (warehouse_id, matric_number) WHERE NOT is_deleted",
    ),
    (
        "products",
        r#"
        CREATE TABLE IF NOT EXISTS products (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            warehouse_id UUID NOT NULL REFERENCES warehouses(id),
            name TEXT NOT NULL,
            barcode TEXT,
            description TEXT,
            quantity INTEGER NOT NULL DEFAULT 0 CHECK (quantity >= 0),
            cost_price NUMERIC(12, 2) NOT NULL DEFAULT 0 CHECK (cost_price >= 0),
            retail_price NUMERIC(12, 2) NOT NULL DEFAULT 0 CHECK (retail_price >= 0),
            wholesale_price NUMERIC(12, 2) NOT NULL DEFAULT 0 CHECK (wholesale_price >= 0),
            reorder_level INTEGER NOT NULL DEFAULT 10 CHECK (reorder_level >= 0),
            expiry_date DATE,
            is_deleted BOOLEAN NOT NULL DEFAULT FALSE,
            sync BOOLEAN NOT NULL DEFAULT FALSE,
            synced_at TIMESTAMPTZ,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "products_barcode_live",
        "CREATE UNIQUE INDEX IF NOT EXISTS products_barcode_live ON products (warehouse_id, barcode) WHERE NOT is_deleted AND barcode IS NOT NULL",
    ),
    (
        "consultations",
        r#"
        CREATE TABLE IF NOT EXISTS consultations (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            warehouse_id UUID NOT NULL REFERENCES warehouses(id),
            student_id UUID NOT NULL REFERENCES students(id),
            user_id UUID REFERENCES users(id),
            complaint TEXT,
            diagnosis TEXT,
            notes TEXT,
            total_amount NUMERIC(12, 2) NOT NULL DEFAULT 0,
            amount_paid NUMERIC(12, 2) NOT NULL DEFAULT 0,
            balance NUMERIC(12, 2) NOT NULL DEFAULT 0,
            is_deleted BOOLEAN NOT NULL DEFAULT FALSE,
            sync BOOLEAN NOT NULL DEFAULT FALSE,
            synced_at TIMESTAMPTZ,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            CHECK (amount_paid <= total_amount)
        )
        "#,
    ),
    (
        "consultations_warehouse_created",
        "CREATE INDEX IF NOT EXISTS consultations_warehouse_created ON consultations (warehouse_id, created_at DESC)",
    ),
    (
        "consultation_items",
        r#"
        CREATE TABLE IF NOT EXISTS consultation_items (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            consultation_id UUID NOT NULL REFERENCES consultations(id),
            product_id UUID NOT NULL REFERENCES products(id),
            quantity INTEGER NOT NULL CHECK (quantity > 0),
            unit_price NUMERIC(12, 2) NOT NULL CHECK (unit_price >= 0),
            line_total NUMERIC(12, 2) NOT NULL,
            dosage TEXT,
            is_deleted BOOLEAN NOT NULL DEFAULT FALSE,
            sync BOOLEAN NOT NULL DEFAULT FALSE,
            synced_at TIMESTAMPTZ,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "payment_methods",
        r#"
        CREATE TABLE IF NOT EXISTS payment_methods (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            consultation_id UUID NOT NULL REFERENCES consultations(id),
            method TEXT NOT NULL CHECK (method IN ('cash', 'card', 'transfer', 'insurance')),
            amount NUMERIC(12, 2) NOT NULL CHECK (amount > 0),
            is_deleted BOOLEAN NOT NULL DEFAULT FALSE,
            sync BOOLEAN NOT NULL DEFAULT FALSE,
            synced_at TIMESTAMPTZ,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "stock_tracking",
        r#"
        CREATE TABLE IF NOT EXISTS stock_tracking (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            warehouse_id UUID NOT NULL REFERENCES warehouses(id),
            product_id UUID NOT NULL REFERENCES products(id),
            user_id UUID REFERENCES users(id),
            consultation_id UUID REFERENCES consultations(id),
            quantity_change INTEGER NOT NULL CHECK (quantity_change <> 0),
            quantity_after INTEGER NOT NULL CHECK (quantity_after >= 0),
            reason TEXT NOT NULL CHECK (reason IN ('restock', 'dispense', 'adjustment', 'consultation', 'void')),
            notes TEXT,
            sync BOOLEAN NOT NULL DEFAULT FALSE,
            synced_at TIMESTAMPTZ,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "stock_tracking_product_created",
        "CREATE INDEX IF NOT EXISTS stock_tracking_product_created ON stock_tracking (product_id, created_at DESC)",
    ),
    (
        "suspicious_activities",
        r#"
        CREATE TABLE IF NOT EXISTS suspicious_activities (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            warehouse_id UUID NOT NULL REFERENCES warehouses(id),
            product_id UUID NOT NULL REFERENCES products(id),
            user_id UUID REFERENCES users(id),
            total_dispensed BIGINT NOT NULL,
            threshold BIGINT NOT NULL,
            window_hours INTEGER NOT NULL,
            sync BOOLEAN NOT NULL DEFAULT FALSE,
            synced_at TIMESTAMPTZ,
            detected_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
];

/// Apply the schema to one store inside a single transaction.
pub async fn run(pool: &PgPool) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    for (name, statement) in SCHEMA {
        tracing::debug!(object = *name, "Applying schema object");
        sqlx::query(statement).execute(&mut *tx).await?;
    }

    tx.commit().await?;
    tracing::info!(objects = SCHEMA.len(), "Schema migrations applied");
    Ok(())
}

/// Apply the schema to the offline store and, when connected, the online store.
pub async fn run_all(stores: &Stores) -> Result<(), sqlx::Error> {
    run(&stores.offline).await?;

    if let Some(online) = &stores.online {
        run(online).await?;
    }

    Ok(())
}

/// Tables that carry `sync`/`synced_at` markers.
pub const SYNCED_TABLES: &[&str] = &[
    "warehouses",
    "users",
    "students",
    "products",
    "consultations",
    "consultation_items",
    "payment_methods",
    "stock_tracking",
    "suspicious_activities",
];

/// Tables that also carry an `is_deleted` tombstone.
pub const SOFT_DELETE_TABLES: &[&str] = &[
    "warehouses",
    "users",
    "students",
    "products",
    "consultations",
    "consultation_items",
    "payment_methods",
];
