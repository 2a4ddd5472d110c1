//! Read-side adapter.

use super::{log_outcome, resolve, ReadEnvelope};
use crate::capability::Reader;
use crate::context::Context;
use crate::error::{NormError, NormResult};
use crate::scan::{scan, ScanShape};
use crate::template::{compile, default_placeholder, Placeholder};
use rusqlite::{params_from_iter, Connection};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::time::Instant;

/// Runs a select-style template against `{A}` and scans the result into `M`.
pub struct SqlReader<'conn, M, A> {
    conn: &'conn Connection,
    template: String,
    placeholder: Placeholder,
    shape: ScanShape,
    _marker: PhantomData<fn(&A) -> M>,
}

impl<'conn, M, A> SqlReader<'conn, M, A> {
    /// `shape` declares whether `M` is decoded from one row or from all rows.
    pub fn new(conn: &'conn Connection, template: impl Into<String>, shape: ScanShape) -> Self {
        Self {
            conn,
            template: template.into(),
            placeholder: default_placeholder(),
            shape,
            _marker: PhantomData,
        }
    }

    /// Overrides the process-wide default placeholder style.
    pub fn with_placeholder(mut self, placeholder: Placeholder) -> Self {
        self.placeholder = placeholder;
        self
    }

    pub fn shape(&self) -> ScanShape {
        self.shape
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    fn query(&self, ctx: &Context<'_>, args: &A) -> NormResult<M>
    where
        M: DeserializeOwned + Serialize,
        A: Serialize,
    {
        ctx.check()?;
        let query = compile(&self.template, &ReadEnvelope { args }, self.placeholder)?;

        let conn = resolve(self.conn, ctx);
        let _registration = ctx.cancel_token().register(conn);
        ctx.check()?;

        let mut stmt = conn.prepare(&query.sql).map_err(NormError::prepare)?;
        ctx.check()?;
        let mut rows = stmt
            .query(params_from_iter(query.params.iter()))
            .map_err(NormError::execute)?;

        scan(ctx, &mut rows, self.shape)
    }
}

impl<M, A> Reader<M, A> for SqlReader<'_, M, A>
where
    M: DeserializeOwned + Serialize,
    A: Serialize,
{
    fn read(&self, ctx: &Context<'_>, args: &A) -> NormResult<M> {
        let started_at = Instant::now();
        let result = self.query(ctx, args);
        log_outcome(
            match self.shape {
                ScanShape::Row => "read",
                ScanShape::Rows => "read_all",
            },
            ctx,
            started_at,
            &result,
        );
        result
    }
}
