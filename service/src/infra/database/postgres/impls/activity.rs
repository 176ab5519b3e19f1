//! [`Activity`]-related [`Database`] implementations.

use common::operations::Insert;
use tracerr::Traced;

use crate::{
    domain::Activity,
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
};

impl<C> Database<Insert<Activity>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(activity): Insert<Activity>,
    ) -> Result<Self::Ok, Self::Err> {
        let Activity {
            id,
            actor_id,
            action,
            entity_type,
            entity_id,
            description,
            timestamp,
            metadata,
        } = activity;

        const SQL: &str = "\
            INSERT INTO activities (\
                id, actor_id, action, entity_type, entity_id, \
                description, timestamp, metadata\
            ) \
            VALUES (\
                $1::UUID, $2::UUID, $3::INT2, $4::INT2, $5::UUID, \
                $6::TEXT, $7::TIMESTAMPTZ, $8::JSONB\
            )";
        self.exec(
            SQL,
            &[
                &id,
                &actor_id,
                &action,
                &entity_type,
                &entity_id,
                &description,
                &timestamp,
                &metadata,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}
