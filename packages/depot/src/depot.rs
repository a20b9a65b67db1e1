use std::collections::HashSet;
use std::marker::PhantomData;

use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait, IdenStatic, QueryFilter,
    QueryOrder, QuerySelect, SqlErr, TransactionTrait,
};
use tracing::{debug, error, info, instrument};

use crate::criteria::{Criterion, FieldValue, Operator};
use crate::database::{DatabaseConfig, init_db};
use crate::error::Result;
use crate::object::Stored;

/// Typed, version-aware store shared by every grading component.
#[derive(Clone, Debug)]
pub struct Depot {
    db: DatabaseConnection,
}

impl Depot {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        Ok(Self::new(init_db(config).await?))
    }

    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Upsert `obj`.
    ///
    /// Non-versioned types replace any row with the same ID; versioned types
    /// replace only the row with the same `(ID, timestamp)`. Only an invalid
    /// object is reported to the caller. Storage failures are logged and
    /// reported as `Ok(false)`; `Ok(true)` means the row is in the depot.
    #[instrument(skip_all, fields(kind = T::KIND, id = %obj.header().id))]
    pub async fn store<T: Stored>(&self, obj: &T) -> Result<bool> {
        obj.validate()?;

        match self.upsert(obj).await {
            Ok(()) => {
                debug!("Stored");
                Ok(true)
            }
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                debug!(error = %e, "Concurrent writer stored the same record");
                Ok(true)
            }
            Err(e) => {
                error!(error = %e, "Failed to store record");
                Ok(false)
            }
        }
    }

    async fn upsert<T: Stored>(&self, obj: &T) -> std::result::Result<(), DbErr> {
        let header = obj.header();
        let mut cond = Condition::all().add(T::id_column().eq(header.id.as_str()));
        if T::IS_VERSIONED {
            cond = cond.add(T::timestamp_column().eq(header.timestamp));
        }

        let txn = self.db.begin().await?;
        T::Entity::delete_many().filter(cond).exec(&txn).await?;
        T::Entity::insert(obj.to_active_model()).exec(&txn).await?;
        txn.commit().await
    }

    /// Start a query over records of type `T`.
    pub fn search<T: Stored>(&self) -> Search<'_, T> {
        Search {
            depot: self,
            criteria: Vec::new(),
            actual: false,
            fields: None,
            _marker: PhantomData,
        }
    }

    /// Delete every record of type `T` matching all `criteria`. No criteria
    /// deletes the whole type. Returns the number of rows removed.
    #[instrument(skip_all, fields(kind = T::KIND))]
    pub async fn delete<T: Stored>(&self, criteria: &[Criterion]) -> Result<u64> {
        let cond = condition::<T>(criteria)?;

        let txn = self.db.begin().await?;
        let res = T::Entity::delete_many().filter(cond).exec(&txn).await?;
        txn.commit().await?;

        info!(deleted = res.rows_affected, "Deleted records");
        Ok(res.rows_affected)
    }
}

fn condition<T: Stored>(criteria: &[Criterion]) -> Result<Condition> {
    criteria.iter().try_fold(Condition::all(), |cond, criterion| {
        let field = T::field(&criterion.field)?;
        Ok(cond.add(criterion.to_condition(field.column)?))
    })
}

/// Query builder returned by [`Depot::search`].
///
/// Results are ordered newest first; equal timestamps fall back to the most
/// recently inserted row.
pub struct Search<'a, T: Stored> {
    depot: &'a Depot,
    criteria: Vec<Criterion>,
    actual: bool,
    fields: Option<Vec<String>>,
    _marker: PhantomData<T>,
}

impl<'a, T: Stored> Search<'a, T> {
    pub fn filter(
        mut self,
        field: impl Into<String>,
        op: Operator,
        value: impl Into<FieldValue>,
    ) -> Self {
        self.criteria.push(Criterion::new(field, op, value));
        self
    }

    pub fn criteria(mut self, criteria: impl IntoIterator<Item = Criterion>) -> Self {
        self.criteria.extend(criteria);
        self
    }

    /// Keep only the newest version per ID. No effect on non-versioned types.
    pub fn actual(mut self) -> Self {
        self.actual = true;
        self
    }

    /// Populate only the named fields; the rest keep their zero value.
    pub fn fields(mut self, names: &[&str]) -> Self {
        self.fields = Some(names.iter().map(|n| n.to_string()).collect());
        self
    }

    pub async fn all(self) -> Result<Vec<T>> {
        self.run(None).await
    }

    pub async fn first(self) -> Result<Option<T>> {
        Ok(self.run(Some(1)).await?.into_iter().next())
    }

    #[instrument(skip_all, fields(kind = T::KIND, actual = self.actual))]
    async fn run(self, limit: Option<u64>) -> Result<Vec<T>> {
        let dedup = self.actual && T::IS_VERSIONED;
        let mut query = T::Entity::find()
            .filter(condition::<T>(&self.criteria)?)
            .order_by_desc(T::timestamp_column())
            .order_by_desc(T::pk_column());

        let mut clear_id = false;
        if let Some(names) = &self.fields {
            let mut wanted = names
                .iter()
                .map(|name| T::field(name).map(|f| f.name))
                .collect::<Result<HashSet<&'static str>>>()?;
            if dedup && wanted.insert("id") {
                clear_id = true;
            }

            query = query.select_only().column(T::pk_column());
            for field in T::fields() {
                query = if wanted.contains(field.name) {
                    query.column(field.column)
                } else {
                    query.column_as(Expr::value((field.zero)()), field.column.as_str())
                };
            }
        }
        if let Some(limit) = limit {
            query = query.limit(limit);
        }

        let txn = self.depot.db.begin().await?;
        let models = query.all(&txn).await?;
        txn.commit().await?;

        let mut seen = HashSet::new();
        let mut records = Vec::with_capacity(models.len());
        for model in models {
            let mut record = T::from_model(model)?;
            if dedup && !seen.insert(record.header().id.clone()) {
                continue;
            }
            if clear_id {
                record.header_mut().id.clear();
            }
            records.push(record);
        }
        debug!(count = records.len(), "Search complete");
        Ok(records)
    }
}
