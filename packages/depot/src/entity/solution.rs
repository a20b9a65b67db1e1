use sea_orm::entity::prelude::*;

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "solutions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub pk: i64,

    #[sea_orm(indexed)]
    pub id: String,
    #[sea_orm(indexed)]
    pub user_id: String,
    #[sea_orm(indexed)]
    pub task_id: String,
    pub timestamp: f64,

    #[sea_orm(column_type = "Text")]
    pub content: String,
    /// JSON object of check ID to argument spec.
    #[sea_orm(column_type = "Text")]
    pub checks: String,
}

impl ActiveModelBehavior for ActiveModel {}
