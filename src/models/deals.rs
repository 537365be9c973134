use sqlx::FromRow;

/// Projeção de um negócio usada na mesclagem: só o que referencia contatos.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct DealContacts {
    pub id: i64,
    pub contact_ids: Vec<i64>,
}
