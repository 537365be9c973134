// src/db/company_repo.rs

use sqlx::{types::Json, Executor, Postgres};

use crate::{
    common::error::AppError,
    models::companies::{Company, NewCompany},
};

#[derive(Clone, Default)]
pub struct CompanyRepository;

impl CompanyRepository {
    pub fn new() -> Self {
        Self
    }

    // Nome exato; o mais antigo ganha se houver homônimos
    pub async fn find_by_name<'e, E>(&self, executor: E, name: &str) -> Result<Option<Company>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let company = sqlx::query_as::<_, Company>(
            "SELECT * FROM companies WHERE name = $1 ORDER BY id ASC LIMIT 1",
        )
        .bind(name)
        .fetch_optional(executor)
        .await?;

        Ok(company)
    }

    pub async fn create<'e, E>(&self, executor: E, company: &NewCompany) -> Result<Company, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let created = sqlx::query_as::<_, Company>(
            r#"
            INSERT INTO companies (
                name, sector, size, linkedin_url, website, phone_number, address,
                zipcode, city, state_abbr, country, description, revenue,
                tax_identifier, context_links, sales_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING *
            "#,
        )
        .bind(&company.name)
        .bind(company.sector.as_deref())
        .bind(company.size)
        .bind(company.linkedin_url.as_deref())
        .bind(company.website.as_deref())
        .bind(company.phone_number.as_deref())
        .bind(company.address.as_deref())
        .bind(company.zipcode.as_deref())
        .bind(company.city.as_deref())
        .bind(company.state_abbr.as_deref())
        .bind(company.country.as_deref())
        .bind(company.description.as_deref())
        .bind(company.revenue.as_deref())
        .bind(company.tax_identifier.as_deref())
        .bind(company.context_links.as_ref().map(Json))
        .bind(company.sales_id)
        .fetch_one(executor)
        .await?;

        Ok(created)
    }
}
