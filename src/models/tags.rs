use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    #[schema(example = "#eddcd2")]
    pub color: String,
}

// Paleta usada quando uma tag nasce de uma importação
pub const TAG_COLORS: &[&str] = &[
    "#eddcd2", "#fff1e6", "#fde2e4", "#fad2e1", "#c5dedd",
    "#dbe7e4", "#f0efeb", "#d6e2e9", "#bcd4e6", "#99c1de",
];
