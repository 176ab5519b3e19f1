//! [`Item`]-related [`Database`] implementations.

use common::operations::{By, Select};
use tracerr::Traced;

use crate::{
    domain::{item, Item},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
};

impl<C> Database<Select<By<Option<Item>, item::Ref>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Item>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Item>, item::Ref>>,
    ) -> Result<Self::Ok, Self::Err> {
        let item::Ref { id, kind } = by.into_inner();

        const SQL: &str = "\
            SELECT owner_id, title, price, images, description, location \
            FROM listings \
            WHERE id = $1::UUID \
              AND kind = $2::INT2";
        Ok(self
            .query_opt(SQL, &[&id, &kind])
            .await
            .map_err(tracerr::wrap!())?
            .map(|row| Item {
                id,
                kind,
                owner_id: row.get("owner_id"),
                title: row.get("title"),
                price: row.get("price"),
                images: row.get("images"),
                description: row.get("description"),
                location: row.get("location"),
            }))
    }
}
