use sqlx::{PgPool, Postgres, Transaction};

use crate::common::error::AppError;

// ---
// Helper RLS: A "Chave" para o Banco de Dados
// ---
/// Abre uma transação e define a variável `app.sale_id` apenas para ela
/// (`set_config(..., true)`).
///
/// Não é isolamento: as políticas de RLS só valem para papéis que não são
/// donos das tabelas, e o backend precisa conectar como dono (as consultas
/// feitas direto na pool não definem a variável). As permissões são checadas
/// nos serviços; a variável fica para os clientes que acessam o banco com um
/// papel restrito.
pub(crate) async fn begin_rls_transaction(
    pool: &PgPool,
    sale_id: i64,
) -> Result<Transaction<'static, Postgres>, AppError> {
    // O operador '?' converte automaticamente sqlx::Error -> AppError::DatabaseError
    let mut tx = pool.begin().await?;

    sqlx::query("SELECT set_config('app.sale_id', $1, true)")
        .bind(sale_id.to_string())
        .execute(&mut *tx)
        .await?;

    Ok(tx)
}

/// Traduz violação de unicidade num erro de domínio; o resto vira DatabaseError.
pub(crate) fn map_unique_violation(e: sqlx::Error, on_conflict: impl FnOnce() -> AppError) -> AppError {
    if let Some(db_err) = e.as_database_error() {
        if db_err.is_unique_violation() {
            return on_conflict();
        }
    }
    e.into()
}
