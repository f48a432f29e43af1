use async_trait::async_trait;
use panic_dashboard_domain::storage::{
    MetricStore, StoreConnection, StoreError, StoreReply, StoreRequest, StoreResult,
};
use redis::{aio::MultiplexedConnection, ConnectionAddr, ConnectionInfo, RedisConnectionInfo};
use tracing::debug;

use crate::{errors::classify, RedisMetricStore};

/// Which of the two reads a request needs. Redis rejects `MGET` and `HMGET`
/// without keys, so empty halves are skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadPlan {
    Nothing,
    FlatOnly,
    HashOnly,
    Both,
}

impl ReadPlan {
    fn for_request(request: &StoreRequest) -> Self {
        match (
            request.flat_keys.is_empty(),
            request.hash_fields.is_empty(),
        ) {
            (true, true) => ReadPlan::Nothing,
            (false, true) => ReadPlan::FlatOnly,
            (true, false) => ReadPlan::HashOnly,
            (false, false) => ReadPlan::Both,
        }
    }
}

/// The database is left at 0 here and selected by [`RedisMetricStore::connect`]
/// so a refused `SELECT` keeps its server error code.
fn connection_info(connection: &StoreConnection) -> ConnectionInfo {
    ConnectionInfo {
        addr: ConnectionAddr::Tcp(connection.host.clone(), connection.port),
        redis: RedisConnectionInfo {
            db: 0,
            password: connection.password.clone(),
            ..Default::default()
        },
    }
}

impl RedisMetricStore {
    async fn connect(&self, connection: &StoreConnection) -> StoreResult<MultiplexedConnection> {
        let client = redis::Client::open(connection_info(connection)).map_err(classify)?;
        let mut con = client
            .get_multiplexed_async_connection()
            .await
            .map_err(classify)?;
        redis::cmd("SELECT")
            .arg(connection.database)
            .query_async::<_, ()>(&mut con)
            .await
            .map_err(classify)?;
        Ok(con)
    }

    async fn read(
        &self,
        connection: &StoreConnection,
        request: &StoreRequest,
        plan: ReadPlan,
    ) -> StoreResult<StoreReply> {
        let mut con = self.connect(connection).await?;

        let mut pipe = redis::pipe();
        pipe.atomic();
        if matches!(plan, ReadPlan::FlatOnly | ReadPlan::Both) {
            pipe.cmd("MGET").arg(&request.flat_keys);
        }
        if matches!(plan, ReadPlan::HashOnly | ReadPlan::Both) {
            pipe.cmd("HMGET")
                .arg(&request.hash_key)
                .arg(&request.hash_fields);
        }

        let reply = match plan {
            ReadPlan::Nothing => StoreReply::default(),
            ReadPlan::FlatOnly => {
                let (flat,): (Vec<Option<String>>,) =
                    pipe.query_async(&mut con).await.map_err(classify)?;
                StoreReply {
                    flat,
                    hash: Vec::new(),
                }
            }
            ReadPlan::HashOnly => {
                let (hash,): (Vec<Option<String>>,) =
                    pipe.query_async(&mut con).await.map_err(classify)?;
                StoreReply {
                    flat: Vec::new(),
                    hash,
                }
            }
            ReadPlan::Both => {
                let (flat, hash): (Vec<Option<String>>, Vec<Option<String>>) =
                    pipe.query_async(&mut con).await.map_err(classify)?;
                StoreReply { flat, hash }
            }
        };
        Ok(reply)
    }
}

#[async_trait]
impl MetricStore for RedisMetricStore {
    async fn fetch(
        &self,
        connection: &StoreConnection,
        request: &StoreRequest,
    ) -> StoreResult<StoreReply> {
        let plan = ReadPlan::for_request(request);
        if plan == ReadPlan::Nothing {
            return Ok(StoreReply::default());
        }
        debug!(
            host = %connection.host,
            port = connection.port,
            database = connection.database,
            keys = request.key_count(),
            "reading metric store"
        );

        tokio::time::timeout(self.request_timeout(), self.read(connection, request, plan))
            .await
            .map_err(|_| {
                StoreError::Connection(format!(
                    "no reply from {}:{} within {:?}",
                    connection.host,
                    connection.port,
                    self.request_timeout()
                ))
            })?
    }
}
