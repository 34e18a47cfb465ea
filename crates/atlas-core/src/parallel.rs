//! Row-parallel iteration shim.
//!
//! With the `threading` feature this re-exports rayon's prelude; without it,
//! `into_par_iter()` falls back to `into_iter()` so call sites stay identical.
//! Every caller computes each row independently, so output never depends on
//! which path is compiled in.

#[cfg(feature = "threading")]
pub(crate) use rayon::prelude::*;

#[cfg(not(feature = "threading"))]
mod sequential {
    pub(crate) trait IntoParallelIterator {
        type Iter;
        fn into_par_iter(self) -> Self::Iter;
    }

    impl<I: IntoIterator> IntoParallelIterator for I {
        type Iter = I::IntoIter;
        fn into_par_iter(self) -> Self::Iter {
            self.into_iter()
        }
    }
}

#[cfg(not(feature = "threading"))]
pub(crate) use sequential::*;
