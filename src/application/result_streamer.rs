//! Executes fall-through statements and streams their rows to the client.

use futures::StreamExt;
use serde_json::Value;

use super::outbound::OutboundQueue;
use crate::domain::foundation::BridgeError;
use crate::domain::protocol::{to_native_placeholders, OutboundFrame, SqlArg};
use crate::ports::{DatabaseConnection, QueryResult};

/// Counts for one executed statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamSummary {
    /// Rows produced by the statement.
    pub rows: usize,
    /// Frames actually sent (rows with a non-empty first column).
    pub frames: usize,
}

/// Streams statement results as outbound text frames.
pub struct ResultStreamer<'a> {
    outbound: &'a OutboundQueue,
}

impl<'a> ResultStreamer<'a> {
    pub fn new(outbound: &'a OutboundQueue) -> Self {
        Self { outbound }
    }

    /// Runs `statement` with `args` bound positionally.
    ///
    /// Each row's first column becomes one frame, in row order. Empty
    /// strings, `NULL`s and column-less rows produce no frame. A statement
    /// without a result set completes with zero frames. The row stream is
    /// dropped on every exit path, which releases the server-side portal.
    pub async fn execute(
        &self,
        conn: &dyn DatabaseConnection,
        statement: &str,
        args: &[Value],
    ) -> Result<StreamSummary, BridgeError> {
        let sql = to_native_placeholders(statement, args.len())?;
        let params = SqlArg::from_values(args);

        let mut rows = match conn.query(&sql, &params).await? {
            QueryResult::Rows(rows) => rows,
            QueryResult::NoResultSet { rows_affected } => {
                tracing::debug!(rows_affected, "statement returned no result set");
                return Ok(StreamSummary::default());
            }
        };

        let mut summary = StreamSummary::default();
        while let Some(row) = rows.next().await {
            let row = row?;
            summary.rows += 1;

            match row.first_column {
                Some(text) if !text.is_empty() => {
                    if !self.outbound.push(OutboundFrame::Text(text)) {
                        return Err(BridgeError::OutboundClosed);
                    }
                    summary.frames += 1;
                }
                _ => {}
            }
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryDatabase, ScriptedResponse};
    use crate::ports::DatabaseConnector;
    use serde_json::json;

    fn drain(rx: &mut tokio::sync::mpsc::UnboundedReceiver<OutboundFrame>) -> Vec<OutboundFrame> {
        let mut frames = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            frames.push(frame);
        }
        frames
    }

    #[tokio::test]
    async fn streams_non_empty_first_columns_in_order() {
        let db = InMemoryDatabase::new();
        db.respond(
            "SELECT name FROM users",
            ScriptedResponse::rows([Some("ann"), Some(""), None, Some("bob")]),
        );
        let conn = db.connect().await.unwrap();
        let (queue, mut rx) = OutboundQueue::new();

        let summary = ResultStreamer::new(&queue)
            .execute(conn.as_ref(), "SELECT name FROM users", &[])
            .await
            .unwrap();

        assert_eq!(summary, StreamSummary { rows: 4, frames: 2 });
        assert_eq!(
            drain(&mut rx),
            vec![OutboundFrame::Text("ann".into()), OutboundFrame::Text("bob".into())]
        );
    }

    #[tokio::test]
    async fn no_result_set_yields_zero_frames() {
        let db = InMemoryDatabase::new();
        db.respond("CREATE TABLE t (id int)", ScriptedResponse::NoResultSet(0));
        let conn = db.connect().await.unwrap();
        let (queue, mut rx) = OutboundQueue::new();

        let summary = ResultStreamer::new(&queue)
            .execute(conn.as_ref(), "CREATE TABLE t (id int)", &[])
            .await
            .unwrap();

        assert_eq!(summary, StreamSummary::default());
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn binds_rewritten_placeholders() {
        let db = InMemoryDatabase::new();
        let conn = db.connect().await.unwrap();
        let (queue, _rx) = OutboundQueue::new();

        ResultStreamer::new(&queue)
            .execute(conn.as_ref(), "INSERT INTO t VALUES (%s, %s)", &[json!(1), json!("x")])
            .await
            .unwrap();

        let executed = db.executed();
        assert_eq!(executed.len(), 1);
        assert_eq!(executed[0].statement, "INSERT INTO t VALUES ($1, $2)");
        assert_eq!(executed[0].args, vec![SqlArg::Int(1), SqlArg::Text("x".into())]);
    }

    #[tokio::test]
    async fn placeholder_errors_skip_execution() {
        let db = InMemoryDatabase::new();
        let conn = db.connect().await.unwrap();
        let (queue, _rx) = OutboundQueue::new();

        let err = ResultStreamer::new(&queue)
            .execute(conn.as_ref(), "SELECT %s", &[])
            .await
            .unwrap_err();

        assert!(matches!(err, BridgeError::InvalidStatement(_)));
        assert!(db.executed().is_empty());
    }

    #[tokio::test]
    async fn execution_errors_propagate() {
        let db = InMemoryDatabase::new();
        db.respond(
            "SELECT * FROM nonexistent_table;",
            ScriptedResponse::Error("relation \"nonexistent_table\" does not exist".into()),
        );
        let conn = db.connect().await.unwrap();
        let (queue, _rx) = OutboundQueue::new();

        let err = ResultStreamer::new(&queue)
            .execute(conn.as_ref(), "SELECT * FROM nonexistent_table;", &[])
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "relation \"nonexistent_table\" does not exist");
    }

    #[tokio::test]
    async fn error_mid_stream_keeps_rows_already_sent() {
        let db = InMemoryDatabase::new();
        db.respond(
            "SELECT risky()",
            ScriptedResponse::PartialRows {
                rows: vec![Some("one".into())],
                error: "division by zero".into(),
            },
        );
        let conn = db.connect().await.unwrap();
        let (queue, mut rx) = OutboundQueue::new();

        let err = ResultStreamer::new(&queue)
            .execute(conn.as_ref(), "SELECT risky()", &[])
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "division by zero");
        assert_eq!(drain(&mut rx), vec![OutboundFrame::Text("one".into())]);
    }

    #[tokio::test]
    async fn closed_queue_stops_streaming() {
        let db = InMemoryDatabase::new();
        db.respond("SELECT 'x'", ScriptedResponse::rows([Some("x")]));
        let conn = db.connect().await.unwrap();
        let (queue, rx) = OutboundQueue::new();
        drop(rx);

        let err = ResultStreamer::new(&queue)
            .execute(conn.as_ref(), "SELECT 'x'", &[])
            .await
            .unwrap_err();

        assert!(matches!(err, BridgeError::OutboundClosed));
    }
}
