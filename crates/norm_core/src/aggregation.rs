//! Keyed aggregation over independently fetched result sets.
//!
//! # Responsibility
//! - `lookup`: left outer join of two sources by a derived key.
//! - `group`: partition one source by a derived key.
//!
//! # Invariants
//! - `lookup` emits exactly one `Merge` per left element, in left order.
//! - Right buckets keep the original right order, duplicates included.
//! - An unmatched left element carries an empty, unallocated right bucket;
//!   matched buckets are never empty.
//! - `group` buckets keep fetch order, duplicates included.
//! - Fetches are sequential: a failing left fetch skips the right fetch.

use crate::capability::Reader;
use crate::context::Context;
use crate::error::{FetchSide, NormError, NormResult};
use log::debug;
use std::collections::HashMap;
use std::hash::Hash;

/// Computes the aggregation key of a value.
pub trait Keyable<K> {
    fn key(&self) -> K;
}

/// One row of a keyed left outer join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Merge<L, R> {
    pub left: L,
    /// Right values sharing the left key; empty when nothing matched.
    pub right: Vec<R>,
}

/// Fetches both sides and left-outer-joins them by key.
///
/// # Errors
/// - `Fetch { side: Left }` when the left source fails; the right source is
///   not queried.
/// - `Fetch { side: Right }` when the right source fails.
/// - `Cancelled` when the scope is cancelled before a fetch.
pub fn lookup<L, R, K, LS, RS, LA, RA>(
    ctx: &Context<'_>,
    lhs: &LS,
    lhs_args: &LA,
    rhs: &RS,
    rhs_args: &RA,
) -> NormResult<Vec<Merge<L, R>>>
where
    LS: Reader<Vec<L>, LA> + ?Sized,
    RS: Reader<Vec<R>, RA> + ?Sized,
    L: Keyable<K>,
    R: Keyable<K> + Clone,
    K: Eq + Hash,
{
    let left = fetch(ctx, lhs, lhs_args, FetchSide::Left)?;
    let right = fetch(ctx, rhs, rhs_args, FetchSide::Right)?;

    debug!(
        "event=norm_lookup module=aggregation status=ok scope={} left={} right={}",
        ctx.scope_id(),
        left.len(),
        right.len()
    );
    Ok(join_by_key(left, right))
}

/// Fetches one source and partitions it by key.
///
/// # Errors
/// - `Fetch { side: Single }` when the source fails.
/// - `Cancelled` when the scope is cancelled before the fetch.
pub fn group<T, K, S, A>(ctx: &Context<'_>, source: &S, args: &A) -> NormResult<HashMap<K, Vec<T>>>
where
    S: Reader<Vec<T>, A> + ?Sized,
    T: Keyable<K>,
    K: Eq + Hash,
{
    let values = fetch(ctx, source, args, FetchSide::Single)?;

    debug!(
        "event=norm_group module=aggregation status=ok scope={} values={}",
        ctx.scope_id(),
        values.len()
    );
    Ok(partition_by_key(values))
}

/// Left-outer-joins two in-memory sequences by key.
pub fn join_by_key<L, R, K>(left: Vec<L>, right: Vec<R>) -> Vec<Merge<L, R>>
where
    L: Keyable<K>,
    R: Keyable<K> + Clone,
    K: Eq + Hash,
{
    let index = partition_by_key(right);
    let mut out = Vec::with_capacity(left.len());

    for value in left {
        let right = index.get(&value.key()).cloned().unwrap_or_default();
        out.push(Merge { left: value, right });
    }

    out
}

/// Partitions an in-memory sequence by key, keeping input order per bucket.
pub fn partition_by_key<T, K>(values: Vec<T>) -> HashMap<K, Vec<T>>
where
    T: Keyable<K>,
    K: Eq + Hash,
{
    let mut groups: HashMap<K, Vec<T>> = HashMap::new();
    for value in values {
        groups.entry(value.key()).or_default().push(value);
    }
    groups
}

fn fetch<M, A, S>(ctx: &Context<'_>, source: &S, args: &A, side: FetchSide) -> NormResult<M>
where
    S: Reader<M, A> + ?Sized,
{
    ctx.check()?;
    source.read(ctx, args).map_err(|err| {
        debug!(
            "event=norm_fetch module=aggregation status=error scope={} side={} error={}",
            ctx.scope_id(),
            side.as_str(),
            err
        );
        NormError::fetch(side, err)
    })
}
