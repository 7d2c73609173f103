use sqlx::{PgPool, Postgres, Transaction};
use thiserror::Error;

use crate::{auth::CredentialError, config::AppConfig, CredentialService};

#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("seeding failed: {0}")]
    Database(#[from] sqlx::Error),
    #[error("admin password could not be hashed: {0}")]
    Credential(#[from] CredentialError),
}

struct SeedCategory {
    name: &'static str,
    slug: &'static str,
    description: &'static str,
    items: &'static [(&'static str, &'static str, f64)],
}

const SEED_MENU: &[SeedCategory] = &[
    SeedCategory {
        name: "Coffee",
        slug: "coffee",
        description: "Freshly roasted coffee",
        items: &[
            ("Americano", "Classic espresso topped up with water", 250.0),
            ("Cappuccino", "Espresso with a thick milk foam", 350.0),
            ("Latte", "Mild coffee with steamed milk", 380.0),
            ("Flat White", "Double espresso with microfoam", 400.0),
            ("Filter Coffee", "Alternative brewing", 350.0),
        ],
    },
    SeedCategory {
        name: "Breakfast",
        slug: "breakfast",
        description: "Served until 14:00",
        items: &[
            ("Avocado Toast", "Toast, avocado, poached egg, microgreens", 690.0),
            ("Danish Salmon Breakfast", "Salmon, cream cheese, bagel, greens", 790.0),
            ("Shrimp Omelette", "Fluffy omelette with tiger prawns", 890.0),
            ("Potato Pancakes", "Crispy potato pancakes with sour cream", 450.0),
        ],
    },
    SeedCategory {
        name: "Main Dishes",
        slug: "main",
        description: "Main dishes",
        items: &[
            ("Chicken Schnitzel", "Crispy schnitzel with a side", 590.0),
            ("Tuna Sandwich", "Tuna, avocado, arugula", 550.0),
            ("Truffle Buckwheat", "Buckwheat with truffle oil and parmesan", 630.0),
        ],
    },
    SeedCategory {
        name: "Hot Drinks",
        slug: "hot-drinks",
        description: "Tea, cocoa, chocolate",
        items: &[
            ("Matcha Latte", "Japanese green tea with milk", 500.0),
            ("Hot Chocolate", "Real Belgian chocolate", 450.0),
            ("Cocoa", "Homemade cocoa with marshmallows", 400.0),
        ],
    },
];

/// run
///
/// Brings a fresh or existing database to a usable state: applies the embedded
/// migrations, then seeds the demo menu and the configured admin. Safe to run on
/// every startup.
pub async fn run(pool: &PgPool, config: &AppConfig) -> Result<(), BootstrapError> {
    sqlx::migrate!("./migrations").run(pool).await?;

    let mut tx = pool.begin().await?;
    seed_menu_if_empty(&mut tx).await?;
    seed_admin(&mut tx, &config.admin_username, &config.admin_password).await?;
    tx.commit().await?;

    Ok(())
}

/// Seeds categories, their items and one sample banner, but only into an empty store.
async fn seed_menu_if_empty(tx: &mut Transaction<'_, Postgres>) -> Result<(), BootstrapError> {
    let (existing,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM categories")
        .fetch_one(&mut **tx)
        .await?;
    if existing > 0 {
        tracing::debug!("menu already present, skipping seed");
        return Ok(());
    }

    let mut item_count = 0;
    for (position, category) in SEED_MENU.iter().enumerate() {
        let (category_id,): (i64,) = sqlx::query_as(
            "INSERT INTO categories (name, slug, description, sort_order) \
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(category.name)
        .bind(category.slug)
        .bind(category.description)
        .bind(position as i32 + 1)
        .fetch_one(&mut **tx)
        .await?;

        for (name, description, price) in category.items {
            sqlx::query(
                "INSERT INTO menu_items (category_id, name, description, price, is_available) \
                 VALUES ($1, $2, $3, $4, TRUE)",
            )
            .bind(category_id)
            .bind(*name)
            .bind(*description)
            .bind(*price)
            .execute(&mut **tx)
            .await?;
            item_count += 1;
        }
    }

    sqlx::query(
        "INSERT INTO banners (title, discount_text, description, is_active, sort_order) \
         VALUES ($1, $2, $3, TRUE, 0)",
    )
    .bind("Rolls promotion")
    .bind("50%")
    .bind("Half price on all rolls until the end of the week")
    .execute(&mut **tx)
    .await?;

    tracing::info!(
        categories = SEED_MENU.len(),
        items = item_count,
        "seeded demo menu and banner"
    );
    Ok(())
}

/// Creates the admin principal unless one with this username already exists.
async fn seed_admin(
    tx: &mut Transaction<'_, Postgres>,
    username: &str,
    password: &str,
) -> Result<(), BootstrapError> {
    let hashed_password = CredentialService::hash_password(password)?;

    let inserted = sqlx::query(
        "INSERT INTO admin_users (username, hashed_password) VALUES ($1, $2) \
         ON CONFLICT (username) DO NOTHING",
    )
    .bind(username)
    .bind(hashed_password)
    .execute(&mut **tx)
    .await?;

    if inserted.rows_affected() > 0 {
        tracing::info!(username = %username, "seeded admin user");
    }
    Ok(())
}
