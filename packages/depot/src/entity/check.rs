use common::Category;
use sea_orm::entity::prelude::*;

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "checks")]
pub struct Model {
    /// Insertion order, used as the tie-break between equal timestamps.
    #[sea_orm(primary_key)]
    pub pk: i64,

    #[sea_orm(indexed)]
    pub id: String,
    #[sea_orm(indexed)]
    pub user_id: String,
    #[sea_orm(indexed)]
    pub task_id: String,
    pub timestamp: f64,

    /// JSON object of filename to hex-encoded bytes.
    #[sea_orm(column_type = "Text")]
    pub content: String,
    pub category: Category,
}

impl ActiveModelBehavior for ActiveModel {}
