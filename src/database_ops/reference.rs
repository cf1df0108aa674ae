// Lazy get-or-create for reference rows (countries, categories, products, sources).
// Lookups go by identity key; rows are never updated once created.

use sqlx::SqliteConnection;
use tracing::{debug, info, instrument};

use crate::database_ops::models::{Category, Country, Product, ProductListing, Source, SourceKind};

#[instrument(skip(conn))]
pub async fn ensure_country(
    conn: &mut SqliteConnection,
    name: &str,
    code: &str,
    currency: &str,
) -> Result<Country, sqlx::Error> {
    let code = code.trim().to_ascii_uppercase();
    if let Some(c) = country_by_code(&mut *conn, &code).await? {
        debug!(country = %code, country_id = c.id, "country exists");
        return Ok(c);
    }
    let id = sqlx::query("INSERT INTO countries (name, code, currency) VALUES (?, ?, ?)")
        .bind(name)
        .bind(&code)
        .bind(currency)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();
    info!(country = %code, country_id = id, "created country {name}");
    Ok(Country {
        id,
        name: name.to_string(),
        code,
        currency: currency.to_string(),
    })
}

#[instrument(skip(conn))]
pub async fn ensure_category(
    conn: &mut SqliteConnection,
    name: &str,
    description: Option<&str>,
) -> Result<Category, sqlx::Error> {
    if let Some(c) = sqlx::query_as::<_, Category>(
        "SELECT id, name, description FROM categories WHERE name = ?",
    )
    .bind(name)
    .fetch_optional(&mut *conn)
    .await?
    {
        return Ok(c);
    }
    let id = sqlx::query("INSERT INTO categories (name, description) VALUES (?, ?)")
        .bind(name)
        .bind(description)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();
    info!(category_id = id, "created category {name}");
    Ok(Category {
        id,
        name: name.to_string(),
        description: description.map(str::to_string),
    })
}

/// Catalog attributes of a product; identity is (name, brand, model).
#[derive(Debug, Clone, Copy)]
pub struct ProductSpec<'a> {
    pub name: &'a str,
    pub brand: &'a str,
    pub model: &'a str,
    pub category: &'a str,
    pub category_description: Option<&'a str>,
    pub description: Option<&'a str>,
    pub url_template: Option<&'a str>,
}

#[instrument(skip(conn, spec), fields(product = spec.name))]
pub async fn ensure_product(
    conn: &mut SqliteConnection,
    spec: &ProductSpec<'_>,
) -> Result<Product, sqlx::Error> {
    if let Some(p) = sqlx::query_as::<_, Product>(
        "SELECT id, name, brand, model, category_id, description, url_template \
         FROM products WHERE name = ? AND brand = ? AND model = ?",
    )
    .bind(spec.name)
    .bind(spec.brand)
    .bind(spec.model)
    .fetch_optional(&mut *conn)
    .await?
    {
        return Ok(p);
    }

    let category = ensure_category(&mut *conn, spec.category, spec.category_description).await?;
    let id = sqlx::query(
        "INSERT INTO products (name, brand, model, category_id, description, url_template) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(spec.name)
    .bind(spec.brand)
    .bind(spec.model)
    .bind(category.id)
    .bind(spec.description)
    .bind(spec.url_template)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();
    info!(product_id = id, "created product {} ({} {})", spec.name, spec.brand, spec.model);
    Ok(Product {
        id,
        name: spec.name.to_string(),
        brand: spec.brand.to_string(),
        model: spec.model.to_string(),
        category_id: Some(category.id),
        description: spec.description.map(str::to_string),
        url_template: spec.url_template.map(str::to_string),
    })
}

#[instrument(skip(conn))]
pub async fn ensure_source(
    conn: &mut SqliteConnection,
    name: &str,
    kind: SourceKind,
    url: Option<&str>,
    description: Option<&str>,
) -> Result<Source, sqlx::Error> {
    if let Some(s) = sqlx::query_as::<_, Source>(
        "SELECT id, name, type, url, description FROM sources WHERE name = ? AND type = ?",
    )
    .bind(name)
    .bind(kind.as_str())
    .fetch_optional(&mut *conn)
    .await?
    {
        return Ok(s);
    }
    let id = sqlx::query("INSERT INTO sources (name, type, url, description) VALUES (?, ?, ?, ?)")
        .bind(name)
        .bind(kind.as_str())
        .bind(url)
        .bind(description)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();
    info!(source_id = id, kind = %kind, "created source {name}");
    Ok(Source {
        id,
        name: name.to_string(),
        kind: kind.as_str().to_string(),
        url: url.map(str::to_string),
        description: description.map(str::to_string),
    })
}

pub async fn country_by_code(
    conn: &mut SqliteConnection,
    code: &str,
) -> Result<Option<Country>, sqlx::Error> {
    sqlx::query_as::<_, Country>("SELECT id, name, code, currency FROM countries WHERE code = ?")
        .bind(code.trim().to_ascii_uppercase())
        .fetch_optional(conn)
        .await
}

pub async fn country_by_id(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<Country>, sqlx::Error> {
    sqlx::query_as::<_, Country>("SELECT id, name, code, currency FROM countries WHERE id = ?")
        .bind(id)
        .fetch_optional(conn)
        .await
}

pub async fn product_by_id(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<Product>, sqlx::Error> {
    sqlx::query_as::<_, Product>(
        "SELECT id, name, brand, model, category_id, description, url_template \
         FROM products WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(conn)
    .await
}

pub async fn product_by_name(
    conn: &mut SqliteConnection,
    name: &str,
) -> Result<Option<Product>, sqlx::Error> {
    sqlx::query_as::<_, Product>(
        "SELECT id, name, brand, model, category_id, description, url_template \
         FROM products WHERE name = ? ORDER BY id LIMIT 1",
    )
    .bind(name)
    .fetch_optional(conn)
    .await
}

pub async fn all_products(conn: &mut SqliteConnection) -> Result<Vec<ProductListing>, sqlx::Error> {
    sqlx::query_as::<_, ProductListing>(
        "SELECT p.id, p.name, p.brand, p.model, p.description, c.name AS category \
         FROM products p LEFT JOIN categories c ON c.id = p.category_id ORDER BY p.id",
    )
    .fetch_all(conn)
    .await
}

pub async fn all_countries(conn: &mut SqliteConnection) -> Result<Vec<Country>, sqlx::Error> {
    sqlx::query_as::<_, Country>("SELECT id, name, code, currency FROM countries ORDER BY id")
        .fetch_all(conn)
        .await
}
