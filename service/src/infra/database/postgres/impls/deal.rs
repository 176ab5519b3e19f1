//! [`Deal`]-related [`Database`] implementations.

use common::operations::{By, Delete, Insert, Select, Update};
use itertools::Itertools as _;
use postgres_types::ToSql;
use tokio_postgres::Row;
use tracerr::Traced;

use crate::{
    domain::{deal, item, Deal},
    infra::{
        database::{
            self,
            postgres::{like_pattern, Connection},
            Postgres,
        },
        Database,
    },
    read::deal::{
        list::{self, Order, Scope, SortKey},
        Stats,
    },
};

/// Columns of the `deals` table, in the order [`from_row()`] expects them.
const COLUMNS: &str = "\
    id, code, \
    buyer_id, buyer_name, buyer_email, buyer_phone, \
    seller_id, seller_name, seller_email, seller_phone, \
    item_id, item_type, \
    item_title, item_price, item_images, item_description, item_location, \
    message, tag, cancellation_reason, \
    status, revision, \
    created_at, updated_at, completed_at, cancelled_at";

/// Reads a [`Deal`] out of the provided [`Row`] selected with [`COLUMNS`].
fn from_row(row: &Row) -> Deal {
    Deal {
        id: row.get("id"),
        code: row.get("code"),
        buyer: deal::Party {
            id: row.get("buyer_id"),
            name: row.get("buyer_name"),
            email: row.get("buyer_email"),
            phone: row.get("buyer_phone"),
        },
        seller: deal::Party {
            id: row.get("seller_id"),
            name: row.get("seller_name"),
            email: row.get("seller_email"),
            phone: row.get("seller_phone"),
        },
        item: item::Ref {
            id: row.get("item_id"),
            kind: row.get("item_type"),
        },
        snapshot: item::Snapshot {
            title: row.get("item_title"),
            price: row.get("item_price"),
            images: row.get("item_images"),
            description: row.get("item_description"),
            location: row.get("item_location"),
        },
        message: row.get("message"),
        tag: row.get("tag"),
        cancellation_reason: row.get("cancellation_reason"),
        status: row.get("status"),
        revision: row.get("revision"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        completed_at: row.get("completed_at"),
        cancelled_at: row.get("cancelled_at"),
    }
}

impl<C> Database<Select<By<Option<Deal>, deal::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Deal>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Deal>, deal::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();

        let sql = format!("SELECT {COLUMNS} FROM deals WHERE id = $1::UUID");
        Ok(self
            .query_opt(&sql, &[&id])
            .await
            .map_err(tracerr::wrap!())?
            .as_ref()
            .map(from_row))
    }
}

impl<C> Database<Select<By<Option<Deal>, deal::Key>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Deal>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Deal>, deal::Key>>,
    ) -> Result<Self::Ok, Self::Err> {
        let deal::Key {
            buyer_id,
            seller_id,
            item,
        } = by.into_inner();

        let sql = format!(
            "SELECT {COLUMNS} \
             FROM deals \
             WHERE buyer_id = $1::UUID \
               AND seller_id = $2::UUID \
               AND item_id = $3::UUID \
               AND item_type = $4::INT2",
        );
        Ok(self
            .query_opt(&sql, &[&buyer_id, &seller_id, &item.id, &item.kind])
            .await
            .map_err(tracerr::wrap!())?
            .as_ref()
            .map(from_row))
    }
}

impl<C> Database<Select<By<Vec<Deal>, list::Selector>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Vec<Deal>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Deal>, list::Selector>>,
    ) -> Result<Self::Ok, Self::Err> {
        let list::Selector {
            scope,
            filter:
                list::Filter {
                    search,
                    status,
                    tag,
                    item_kind,
                },
            sort,
        } = by.into_inner();

        let participant = match scope {
            Scope::All => None,
            Scope::Participant(id) => Some(id),
        };
        let pattern = search.as_ref().map(|s| like_pattern(s.needle()));

        let mut ps: Vec<&(dyn ToSql + Sync)> = vec![];
        let mut conditions = vec![];
        if let Some(id) = &participant {
            ps.push(id);
            let idx = ps.len();
            conditions.push(format!(
                "(buyer_id = ${idx}::UUID OR seller_id = ${idx}::UUID)",
            ));
        }
        if let Some(p) = &pattern {
            ps.push(p);
            conditions.push(format!("code ILIKE ${}::VARCHAR", ps.len()));
        }
        if let Some(s) = &status {
            ps.push(s);
            conditions.push(format!("status = ${}::INT2", ps.len()));
        }
        if let Some(t) = &tag {
            ps.push(t);
            conditions.push(format!("tag = ${}::VARCHAR", ps.len()));
        }
        if let Some(k) = &item_kind {
            ps.push(k);
            conditions.push(format!("item_type = ${}::INT2", ps.len()));
        }

        let key = match sort.key {
            SortKey::CreatedAt => "created_at".to_owned(),
            SortKey::UpdatedAt => "updated_at".to_owned(),
            // Statuses are ordered by their wire names.
            SortKey::Status => format!(
                "CASE status {} END",
                deal::Status::ALL.iter().format_with(" ", |s, f| {
                    f(&format_args!("WHEN {} THEN '{}'", s.u8(), s.as_str()))
                }),
            ),
            SortKey::Code => "code".to_owned(),
            SortKey::Price => "item_price".to_owned(),
        };
        let order = match sort.order {
            Order::Asc => "ASC",
            Order::Desc => "DESC",
        };

        let sql = format!(
            "SELECT {COLUMNS} \
             FROM deals \
             {filtering} \
             ORDER BY {key} {order}, id ASC",
            filtering = (!conditions.is_empty())
                .then(|| format!("WHERE {}", conditions.iter().join(" AND ")))
                .unwrap_or_default(),
        );
        Ok(self
            .query(&sql, ps.as_slice())
            .await
            .map_err(tracerr::wrap!())?
            .iter()
            .map(from_row)
            .collect())
    }
}

impl<C> Database<Select<By<Stats, ()>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Stats;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(_): Select<By<Stats, ()>>,
    ) -> Result<Self::Ok, Self::Err> {
        const SQL: &str = "\
            SELECT status, COUNT(*)::INT8 AS count \
            FROM deals \
            GROUP BY status";
        let rows = self.query(SQL, &[]).await.map_err(tracerr::wrap!())?;
        Ok(Stats::from_counts(rows.iter().map(|row| {
            let count: i64 = row.get("count");
            (row.get("status"), count.unsigned_abs())
        })))
    }
}

impl<C> Database<Insert<Deal>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(deal): Insert<Deal>,
    ) -> Result<Self::Ok, Self::Err> {
        let Deal {
            id,
            code,
            buyer,
            seller,
            item,
            snapshot,
            message,
            tag,
            cancellation_reason,
            status,
            revision,
            created_at,
            updated_at,
            completed_at,
            cancelled_at,
        } = deal;

        let sql = format!(
            "INSERT INTO deals ({COLUMNS}) \
             VALUES (\
                 $1::UUID, $2::VARCHAR, \
                 $3::UUID, $4::VARCHAR, $5::VARCHAR, $6::VARCHAR, \
                 $7::UUID, $8::VARCHAR, $9::VARCHAR, $10::VARCHAR, \
                 $11::UUID, $12::INT2, \
                 $13::VARCHAR, $14::NUMERIC, $15::VARCHAR[], \
                 $16::TEXT, $17::VARCHAR, \
                 $18::TEXT, $19::VARCHAR, $20::TEXT, \
                 $21::INT2, $22::INT4, \
                 $23::TIMESTAMPTZ, $24::TIMESTAMPTZ, \
                 $25::TIMESTAMPTZ, $26::TIMESTAMPTZ\
             )",
        );
        self.exec(
            &sql,
            &[
                &id,
                &code,
                &buyer.id,
                &buyer.name,
                &buyer.email,
                &buyer.phone,
                &seller.id,
                &seller.name,
                &seller.email,
                &seller.phone,
                &item.id,
                &item.kind,
                &snapshot.title,
                &snapshot.price,
                &snapshot.images,
                &snapshot.description,
                &snapshot.location,
                &message,
                &tag,
                &cancellation_reason,
                &status,
                &revision,
                &created_at,
                &updated_at,
                &completed_at,
                &cancelled_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<Update<Deal>> for Postgres<C>
where
    C: Connection,
{
    type Ok = bool;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(deal): Update<Deal>,
    ) -> Result<Self::Ok, Self::Err> {
        let Some(previous) = deal.revision.previous() else {
            return Ok(false);
        };

        const SQL: &str = "\
            UPDATE deals \
            SET status = $2::INT2, \
                cancellation_reason = $3::TEXT, \
                revision = $4::INT4, \
                updated_at = $5::TIMESTAMPTZ, \
                completed_at = $6::TIMESTAMPTZ, \
                cancelled_at = $7::TIMESTAMPTZ \
            WHERE id = $1::UUID \
              AND revision = $8::INT4";
        let updated = self
            .exec(
                SQL,
                &[
                    &deal.id,
                    &deal.status,
                    &deal.cancellation_reason,
                    &deal.revision,
                    &deal.updated_at,
                    &deal.completed_at,
                    &deal.cancelled_at,
                    &previous,
                ],
            )
            .await
            .map_err(tracerr::wrap!())?;
        Ok(updated == 1)
    }
}

impl<C> Database<Delete<By<Deal, deal::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Delete(by): Delete<By<Deal, deal::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();

        const SQL: &str = "\
            DELETE FROM deals \
            WHERE id = $1::UUID";
        self.exec(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}
