//! Statement parameter encoding.
//!
//! Every argument goes over the wire in text format and the server
//! parses it into whatever type it inferred for the placeholder. A JSON
//! number bound to a `text` column and a JSON string bound to an `int4`
//! column both work the way they would in a hand-written SQL literal.

use std::error::Error;

use bytes::{BufMut, BytesMut};
use postgres_types::{to_sql_checked, Format, IsNull, ToSql, Type};

use crate::domain::protocol::SqlArg;

impl ToSql for SqlArg {
    fn to_sql(&self, _ty: &Type, out: &mut BytesMut) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self.as_text() {
            None => Ok(IsNull::Yes),
            Some(text) => {
                out.put_slice(text.as_bytes());
                Ok(IsNull::No)
            }
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    fn encode_format(&self, _ty: &Type) -> Format {
        Format::Text
    }

    to_sql_checked!();
}

/// Borrows arguments as the trait objects the driver expects.
pub(crate) fn as_params(args: &[SqlArg]) -> Vec<&(dyn ToSql + Sync)> {
    args.iter().map(|a| a as &(dyn ToSql + Sync)).collect()
}
