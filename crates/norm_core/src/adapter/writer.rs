//! Write-side adapters sharing one execute-and-count pipeline.

use super::{log_outcome, resolve, WriteEnvelope};
use crate::capability::{Creator, Deleter, Updater};
use crate::context::Context;
use crate::error::{NormError, NormResult};
use crate::template::{compile, default_placeholder, Placeholder};
use rusqlite::{params_from_iter, Connection};
use serde::Serialize;
use std::marker::PhantomData;
use std::time::Instant;

struct Writer<'conn> {
    conn: &'conn Connection,
    template: String,
    placeholder: Placeholder,
}

impl<'conn> Writer<'conn> {
    fn new(conn: &'conn Connection, template: impl Into<String>) -> Self {
        Self {
            conn,
            template: template.into(),
            placeholder: default_placeholder(),
        }
    }

    fn affect<M: Serialize, A: Serialize>(
        &self,
        op: &str,
        ctx: &Context<'_>,
        args: &A,
        value: &M,
    ) -> NormResult<()> {
        let started_at = Instant::now();
        let result = self.exec(ctx, &WriteEnvelope { model: value, args });
        log_outcome(op, ctx, started_at, &result);
        result
    }

    fn exec<E: Serialize>(&self, ctx: &Context<'_>, envelope: &E) -> NormResult<()> {
        ctx.check()?;
        let query = compile(&self.template, envelope, self.placeholder)?;

        let conn = resolve(self.conn, ctx);
        let _registration = ctx.cancel_token().register(conn);
        ctx.check()?;

        let mut stmt = conn.prepare(&query.sql).map_err(NormError::prepare)?;
        // An interrupt only reaches running statements; re-check before the first step.
        ctx.check()?;

        let affected = if stmt.column_count() > 0 {
            // `RETURNING` writes yield rows; drain them, then ask the connection.
            let mut rows = stmt
                .query(params_from_iter(query.params.iter()))
                .map_err(NormError::execute)?;
            while rows.next().map_err(NormError::execute)?.is_some() {}
            conn.changes() > 0
        } else {
            let changed = stmt
                .execute(params_from_iter(query.params.iter()))
                .map_err(NormError::execute)?;
            changed > 0
        };

        if !affected {
            return Err(NormError::NotAffected);
        }
        Ok(())
    }
}

macro_rules! write_adapter {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        pub struct $name<'conn, M, A> {
            writer: Writer<'conn>,
            _marker: PhantomData<fn(&M, &A)>,
        }

        impl<'conn, M, A> $name<'conn, M, A> {
            pub fn new(conn: &'conn Connection, template: impl Into<String>) -> Self {
                Self {
                    writer: Writer::new(conn, template),
                    _marker: PhantomData,
                }
            }

            /// Overrides the process-wide default placeholder style.
            pub fn with_placeholder(mut self, placeholder: Placeholder) -> Self {
                self.writer.placeholder = placeholder;
                self
            }

            pub fn template(&self) -> &str {
                &self.writer.template
            }
        }
    };
}

write_adapter!(
    /// Runs an insert-style template against `{M, A}`.
    SqlCreator
);
write_adapter!(
    /// Runs an update-style template against `{M, A}`.
    SqlUpdater
);
write_adapter!(
    /// Runs a delete-style template against `{M::default(), A}`.
    SqlDeleter
);

impl<M: Serialize, A: Serialize> Creator<M, A> for SqlCreator<'_, M, A> {
    fn create(&self, ctx: &Context<'_>, args: &A, value: &M) -> NormResult<()> {
        self.writer.affect("create", ctx, args, value)
    }
}

impl<M: Serialize, A: Serialize> Updater<M, A> for SqlUpdater<'_, M, A> {
    fn update(&self, ctx: &Context<'_>, args: &A, value: &M) -> NormResult<()> {
        self.writer.affect("update", ctx, args, value)
    }
}

impl<M: Serialize + Default, A: Serialize> Deleter<M, A> for SqlDeleter<'_, M, A> {
    fn delete(&self, ctx: &Context<'_>, args: &A) -> NormResult<()> {
        let placeholder = M::default();
        self.writer.affect("delete", ctx, args, &placeholder)
    }
}
