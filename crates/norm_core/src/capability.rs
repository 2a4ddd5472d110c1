//! Capability contracts and the composites built from them.
//!
//! # Responsibility
//! - Define one single-method trait per persistence capability.
//! - Compose capabilities into `Object`, `PersistentObject`, `ImmutableObject`
//!   and `View` by aggregation, with no behavior of their own.
//!
//! # Invariants
//! - Capability traits never reference one another.
//! - Composites only delegate; each capability can be swapped independently.

use crate::context::Context;
use crate::error::NormResult;

/// Persists a new `M` identified by `A`.
pub trait Creator<M, A> {
    fn create(&self, ctx: &Context<'_>, args: &A, value: &M) -> NormResult<()>;
}

/// Fetches an `M` selected by `A`.
///
/// This is also the source contract consumed by [`crate::lookup`] and
/// [`crate::group`].
pub trait Reader<M, A> {
    fn read(&self, ctx: &Context<'_>, args: &A) -> NormResult<M>;
}

/// Replaces the stored `M` selected by `A`.
pub trait Updater<M, A> {
    fn update(&self, ctx: &Context<'_>, args: &A, value: &M) -> NormResult<()>;
}

/// Removes the records selected by `A`.
pub trait Deleter<M, A> {
    fn delete(&self, ctx: &Context<'_>, args: &A) -> NormResult<()>;
}

macro_rules! forward_capability {
    ($wrapper:ty) => {
        impl<M, A, T: Creator<M, A> + ?Sized> Creator<M, A> for $wrapper {
            fn create(&self, ctx: &Context<'_>, args: &A, value: &M) -> NormResult<()> {
                (**self).create(ctx, args, value)
            }
        }

        impl<M, A, T: Reader<M, A> + ?Sized> Reader<M, A> for $wrapper {
            fn read(&self, ctx: &Context<'_>, args: &A) -> NormResult<M> {
                (**self).read(ctx, args)
            }
        }

        impl<M, A, T: Updater<M, A> + ?Sized> Updater<M, A> for $wrapper {
            fn update(&self, ctx: &Context<'_>, args: &A, value: &M) -> NormResult<()> {
                (**self).update(ctx, args, value)
            }
        }

        impl<M, A, T: Deleter<M, A> + ?Sized> Deleter<M, A> for $wrapper {
            fn delete(&self, ctx: &Context<'_>, args: &A) -> NormResult<()> {
                (**self).delete(ctx, args)
            }
        }
    };
}

forward_capability!(&T);
forward_capability!(Box<T>);

/// Full CRUD composite.
#[derive(Debug, Clone)]
pub struct Object<C, R, U, D> {
    creator: C,
    reader: R,
    updater: U,
    deleter: D,
}

impl<C, R, U, D> Object<C, R, U, D> {
    pub fn new(creator: C, reader: R, updater: U, deleter: D) -> Self {
        Self {
            creator,
            reader,
            updater,
            deleter,
        }
    }

    pub fn into_parts(self) -> (C, R, U, D) {
        (self.creator, self.reader, self.updater, self.deleter)
    }
}

/// Create/read/update composite for append- or amend-only stores.
#[derive(Debug, Clone)]
pub struct PersistentObject<C, R, U> {
    creator: C,
    reader: R,
    updater: U,
}

impl<C, R, U> PersistentObject<C, R, U> {
    pub fn new(creator: C, reader: R, updater: U) -> Self {
        Self {
            creator,
            reader,
            updater,
        }
    }

    pub fn into_parts(self) -> (C, R, U) {
        (self.creator, self.reader, self.updater)
    }
}

/// Create/read composite for write-once records.
#[derive(Debug, Clone)]
pub struct ImmutableObject<C, R> {
    creator: C,
    reader: R,
}

impl<C, R> ImmutableObject<C, R> {
    pub fn new(creator: C, reader: R) -> Self {
        Self { creator, reader }
    }

    pub fn into_parts(self) -> (C, R) {
        (self.creator, self.reader)
    }
}

/// Read-only composite for projections such as joins or reports.
#[derive(Debug, Clone)]
pub struct View<R> {
    reader: R,
}

impl<R> View<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<M, A, C: Creator<M, A>, R, U, D> Creator<M, A> for Object<C, R, U, D> {
    fn create(&self, ctx: &Context<'_>, args: &A, value: &M) -> NormResult<()> {
        self.creator.create(ctx, args, value)
    }
}

impl<M, A, C, R: Reader<M, A>, U, D> Reader<M, A> for Object<C, R, U, D> {
    fn read(&self, ctx: &Context<'_>, args: &A) -> NormResult<M> {
        self.reader.read(ctx, args)
    }
}

impl<M, A, C, R, U: Updater<M, A>, D> Updater<M, A> for Object<C, R, U, D> {
    fn update(&self, ctx: &Context<'_>, args: &A, value: &M) -> NormResult<()> {
        self.updater.update(ctx, args, value)
    }
}

impl<M, A, C, R, U, D: Deleter<M, A>> Deleter<M, A> for Object<C, R, U, D> {
    fn delete(&self, ctx: &Context<'_>, args: &A) -> NormResult<()> {
        self.deleter.delete(ctx, args)
    }
}

impl<M, A, C: Creator<M, A>, R, U> Creator<M, A> for PersistentObject<C, R, U> {
    fn create(&self, ctx: &Context<'_>, args: &A, value: &M) -> NormResult<()> {
        self.creator.create(ctx, args, value)
    }
}

impl<M, A, C, R: Reader<M, A>, U> Reader<M, A> for PersistentObject<C, R, U> {
    fn read(&self, ctx: &Context<'_>, args: &A) -> NormResult<M> {
        self.reader.read(ctx, args)
    }
}

impl<M, A, C, R, U: Updater<M, A>> Updater<M, A> for PersistentObject<C, R, U> {
    fn update(&self, ctx: &Context<'_>, args: &A, value: &M) -> NormResult<()> {
        self.updater.update(ctx, args, value)
    }
}

impl<M, A, C: Creator<M, A>, R> Creator<M, A> for ImmutableObject<C, R> {
    fn create(&self, ctx: &Context<'_>, args: &A, value: &M) -> NormResult<()> {
        self.creator.create(ctx, args, value)
    }
}

impl<M, A, C, R: Reader<M, A>> Reader<M, A> for ImmutableObject<C, R> {
    fn read(&self, ctx: &Context<'_>, args: &A) -> NormResult<M> {
        self.reader.read(ctx, args)
    }
}

impl<M, A, R: Reader<M, A>> Reader<M, A> for View<R> {
    fn read(&self, ctx: &Context<'_>, args: &A) -> NormResult<M> {
        self.reader.read(ctx, args)
    }
}
