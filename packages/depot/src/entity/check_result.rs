use common::{Category, Verdict};
use sea_orm::entity::prelude::*;

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "check_results")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub pk: i64,

    /// `check_id ++ solution_id`; one current row per pair.
    #[sea_orm(unique)]
    pub id: String,
    #[sea_orm(indexed)]
    pub user_id: String,
    #[sea_orm(indexed)]
    pub task_id: String,
    pub timestamp: f64,

    pub rating: f64,
    #[sea_orm(indexed)]
    pub category: Category,
    pub check_id: String,
    pub check_timestamp: f64,
    pub solution_id: String,
    pub solution_timestamp: f64,
    pub verdict: Verdict,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ActiveModelBehavior for ActiveModel {}
