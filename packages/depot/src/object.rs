//! Mapping between the object model and the depot tables.

use std::collections::BTreeMap;

use common::record::{decode_content, encode_content};
use common::{Category, Check, CheckResult, Header, Homework, Record, Solution, Verdict};
use sea_orm::{ActiveValue::Set, EntityTrait, Value};

use crate::entity::{check, check_result, homework, solution};
use crate::error::DepotError;

pub type ColumnOf<T> = <<T as Stored>::Entity as EntityTrait>::Column;
pub type ModelOf<T> = <<T as Stored>::Entity as EntityTrait>::Model;
pub type ActiveModelOf<T> = <<T as Stored>::Entity as EntityTrait>::ActiveModel;

/// A queryable field of a stored type.
///
/// `zero` is the value reported for the field when it is not among the
/// requested return fields.
#[derive(Debug)]
pub struct Field<C> {
    pub name: &'static str,
    pub column: C,
    pub zero: fn() -> Value,
}

/// A record type the depot knows how to persist.
pub trait Stored: Record + Sized + Send + Sync {
    type Entity: EntityTrait;

    /// Name used in logs and errors.
    const KIND: &'static str;

    /// Every field addressable by criteria and return-field lists.
    fn fields() -> &'static [Field<ColumnOf<Self>>];

    fn pk_column() -> ColumnOf<Self>;
    fn id_column() -> ColumnOf<Self>;
    fn timestamp_column() -> ColumnOf<Self>;

    fn header_mut(&mut self) -> &mut Header;

    fn to_active_model(&self) -> ActiveModelOf<Self>;

    fn from_model(model: ModelOf<Self>) -> Result<Self, DepotError>;

    /// Look up a field by name. Matching ignores ASCII case, so `ID` and
    /// `check_ID` resolve as well.
    fn field(name: &str) -> Result<&'static Field<ColumnOf<Self>>, DepotError> {
        Self::fields()
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| DepotError::UnknownField {
                kind: Self::KIND,
                field: name.to_string(),
            })
    }
}

fn zero_text() -> Value {
    String::new().into()
}

fn zero_float() -> Value {
    0.0_f64.into()
}

fn zero_bytes() -> Value {
    Vec::<u8>::new().into()
}

fn zero_map() -> Value {
    String::from("{}").into()
}

fn zero_category() -> Value {
    Category::default().as_str().to_string().into()
}

fn zero_verdict() -> Value {
    Verdict::default().as_str().to_string().into()
}

fn corrupt(kind: &'static str, id: &str, reason: impl ToString) -> DepotError {
    DepotError::Corrupt {
        kind,
        id: id.to_string(),
        reason: reason.to_string(),
    }
}

impl Stored for Check {
    type Entity = check::Entity;
    const KIND: &'static str = "check";

    fn fields() -> &'static [Field<check::Column>] {
        const FIELDS: &[Field<check::Column>] = &[
            Field { name: "id", column: check::Column::Id, zero: zero_text },
            Field { name: "user_id", column: check::Column::UserId, zero: zero_text },
            Field { name: "task_id", column: check::Column::TaskId, zero: zero_text },
            Field { name: "timestamp", column: check::Column::Timestamp, zero: zero_float },
            Field { name: "content", column: check::Column::Content, zero: zero_map },
            Field { name: "category", column: check::Column::Category, zero: zero_category },
        ];
        FIELDS
    }

    fn pk_column() -> check::Column {
        check::Column::Pk
    }
    fn id_column() -> check::Column {
        check::Column::Id
    }
    fn timestamp_column() -> check::Column {
        check::Column::Timestamp
    }

    fn header_mut(&mut self) -> &mut Header {
        &mut self.header
    }

    fn to_active_model(&self) -> check::ActiveModel {
        check::ActiveModel {
            id: Set(self.header.id.clone()),
            user_id: Set(self.header.user_id.clone()),
            task_id: Set(self.header.task_id.clone()),
            timestamp: Set(self.header.timestamp),
            content: Set(encode_content(&self.content)),
            category: Set(self.category),
            ..Default::default()
        }
    }

    fn from_model(model: check::Model) -> Result<Self, DepotError> {
        let content = decode_content(&model.content).map_err(|e| corrupt(Self::KIND, &model.id, e))?;
        Ok(Check {
            header: Header::new(model.id, model.user_id, model.task_id, model.timestamp),
            content,
            category: model.category,
        })
    }
}

impl Stored for Solution {
    type Entity = solution::Entity;
    const KIND: &'static str = "solution";

    fn fields() -> &'static [Field<solution::Column>] {
        const FIELDS: &[Field<solution::Column>] = &[
            Field { name: "id", column: solution::Column::Id, zero: zero_text },
            Field { name: "user_id", column: solution::Column::UserId, zero: zero_text },
            Field { name: "task_id", column: solution::Column::TaskId, zero: zero_text },
            Field { name: "timestamp", column: solution::Column::Timestamp, zero: zero_float },
            Field { name: "content", column: solution::Column::Content, zero: zero_map },
            Field { name: "checks", column: solution::Column::Checks, zero: zero_map },
        ];
        FIELDS
    }

    fn pk_column() -> solution::Column {
        solution::Column::Pk
    }
    fn id_column() -> solution::Column {
        solution::Column::Id
    }
    fn timestamp_column() -> solution::Column {
        solution::Column::Timestamp
    }

    fn header_mut(&mut self) -> &mut Header {
        &mut self.header
    }

    fn to_active_model(&self) -> solution::ActiveModel {
        // A map of JSON values always serializes.
        let checks = serde_json::to_string(&self.checks).unwrap_or_else(|_| "{}".to_string());
        solution::ActiveModel {
            id: Set(self.header.id.clone()),
            user_id: Set(self.header.user_id.clone()),
            task_id: Set(self.header.task_id.clone()),
            timestamp: Set(self.header.timestamp),
            content: Set(encode_content(&self.content)),
            checks: Set(checks),
            ..Default::default()
        }
    }

    fn from_model(model: solution::Model) -> Result<Self, DepotError> {
        let content = decode_content(&model.content).map_err(|e| corrupt(Self::KIND, &model.id, e))?;
        let checks = if model.checks.is_empty() {
            BTreeMap::new()
        } else {
            serde_json::from_str(&model.checks).map_err(|e| corrupt(Self::KIND, &model.id, e))?
        };
        Ok(Solution {
            header: Header::new(model.id, model.user_id, model.task_id, model.timestamp),
            content,
            checks,
        })
    }
}

impl Stored for Homework {
    type Entity = homework::Entity;
    const KIND: &'static str = "homework";

    fn fields() -> &'static [Field<homework::Column>] {
        const FIELDS: &[Field<homework::Column>] = &[
            Field { name: "id", column: homework::Column::Id, zero: zero_text },
            Field { name: "user_id", column: homework::Column::UserId, zero: zero_text },
            Field { name: "task_id", column: homework::Column::TaskId, zero: zero_text },
            Field { name: "timestamp", column: homework::Column::Timestamp, zero: zero_float },
            Field { name: "content", column: homework::Column::Content, zero: zero_map },
        ];
        FIELDS
    }

    fn pk_column() -> homework::Column {
        homework::Column::Pk
    }
    fn id_column() -> homework::Column {
        homework::Column::Id
    }
    fn timestamp_column() -> homework::Column {
        homework::Column::Timestamp
    }

    fn header_mut(&mut self) -> &mut Header {
        &mut self.header
    }

    fn to_active_model(&self) -> homework::ActiveModel {
        homework::ActiveModel {
            id: Set(self.header.id.clone()),
            user_id: Set(self.header.user_id.clone()),
            task_id: Set(self.header.task_id.clone()),
            timestamp: Set(self.header.timestamp),
            content: Set(encode_content(&self.content)),
            ..Default::default()
        }
    }

    fn from_model(model: homework::Model) -> Result<Self, DepotError> {
        let content = decode_content(&model.content).map_err(|e| corrupt(Self::KIND, &model.id, e))?;
        Ok(Homework {
            header: Header::new(model.id, model.user_id, model.task_id, model.timestamp),
            content,
        })
    }
}

impl Stored for CheckResult {
    type Entity = check_result::Entity;
    const KIND: &'static str = "check_result";

    fn fields() -> &'static [Field<check_result::Column>] {
        use check_result::Column;
        const FIELDS: &[Field<Column>] = &[
            Field { name: "id", column: Column::Id, zero: zero_text },
            Field { name: "user_id", column: Column::UserId, zero: zero_text },
            Field { name: "task_id", column: Column::TaskId, zero: zero_text },
            Field { name: "timestamp", column: Column::Timestamp, zero: zero_float },
            Field { name: "rating", column: Column::Rating, zero: zero_float },
            Field { name: "category", column: Column::Category, zero: zero_category },
            Field { name: "check_id", column: Column::CheckId, zero: zero_text },
            Field { name: "check_timestamp", column: Column::CheckTimestamp, zero: zero_float },
            Field { name: "solution_id", column: Column::SolutionId, zero: zero_text },
            Field { name: "solution_timestamp", column: Column::SolutionTimestamp, zero: zero_float },
            Field { name: "verdict", column: Column::Verdict, zero: zero_verdict },
            Field { name: "stdout", column: Column::Stdout, zero: zero_bytes },
            Field { name: "stderr", column: Column::Stderr, zero: zero_bytes },
        ];
        FIELDS
    }

    fn pk_column() -> check_result::Column {
        check_result::Column::Pk
    }
    fn id_column() -> check_result::Column {
        check_result::Column::Id
    }
    fn timestamp_column() -> check_result::Column {
        check_result::Column::Timestamp
    }

    fn header_mut(&mut self) -> &mut Header {
        &mut self.header
    }

    fn to_active_model(&self) -> check_result::ActiveModel {
        check_result::ActiveModel {
            id: Set(self.header.id.clone()),
            user_id: Set(self.header.user_id.clone()),
            task_id: Set(self.header.task_id.clone()),
            timestamp: Set(self.header.timestamp),
            rating: Set(self.rating),
            category: Set(self.category),
            check_id: Set(self.check_id.clone()),
            check_timestamp: Set(self.check_timestamp),
            solution_id: Set(self.solution_id.clone()),
            solution_timestamp: Set(self.solution_timestamp),
            verdict: Set(self.verdict),
            stdout: Set(self.stdout.clone()),
            stderr: Set(self.stderr.clone()),
            ..Default::default()
        }
    }

    fn from_model(model: check_result::Model) -> Result<Self, DepotError> {
        Ok(CheckResult {
            header: Header::new(model.id, model.user_id, model.task_id, model.timestamp),
            rating: model.rating,
            category: model.category,
            check_id: model.check_id,
            check_timestamp: model.check_timestamp,
            solution_id: model.solution_id,
            solution_timestamp: model.solution_timestamp,
            verdict: model.verdict,
            stdout: model.stdout,
            stderr: model.stderr,
        })
    }
}
