//! # Pass Management
//!
//! A consistent interface for running and managing transforms on a program.
//! Transforms register themselves under a stable name; pipelines iterate
//! until no pass reports a change.

pub mod const_prop;
pub mod dataflow;
pub mod dce;
pub mod loops;
pub mod ssa;

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::ir::{Function, Program};

#[derive(Debug, Error)]
pub enum PassErrorKind {
    #[error("analysis error")]
    AnalysisError,

    #[error("transform error")]
    TransformError,

    #[error("other error")]
    Other,
}

#[derive(Debug, Error)]
#[error("{kind} on {pass_name}: {err}")]
pub struct PassError {
    kind: PassErrorKind,
    err: Box<dyn std::error::Error + Send + Sync>,
    pass_name: String,
}

pub type PassResult<T> = Result<T, PassError>;

impl PassError {
    pub fn analysis_error(
        pass_name: impl Into<String>,
        err: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self {
            kind: PassErrorKind::AnalysisError,
            err,
            pass_name: pass_name.into(),
        }
    }

    pub fn transform_error(
        pass_name: impl Into<String>,
        err: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self {
            kind: PassErrorKind::TransformError,
            err,
            pass_name: pass_name.into(),
        }
    }

    pub fn other(
        pass_name: impl Into<String>,
        err: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self {
            kind: PassErrorKind::Other,
            err,
            pass_name: pass_name.into(),
        }
    }
}

/// A pass that runs on a function without modifying it.
pub trait LocalPass {
    /// The output of the pass.
    type Output;

    fn run(&mut self, func: &Function) -> PassResult<Self::Output>;
}

/// A pass that runs on a function and maybe modifies it.
pub trait LocalPassMut {
    /// The output of the pass.
    type Output;

    /// Run the pass on the given function.
    ///
    /// # Returns
    ///
    /// A tuple of the output of the pass and a boolean indicating whether
    /// the function has been modified.
    fn run(&mut self, func: &mut Function) -> PassResult<(Self::Output, bool)>;
}

/// A pass that runs on a whole program and maybe modifies it.
pub trait GlobalPassMut {
    /// The output of the pass.
    type Output;

    fn run(&mut self, program: &mut Program) -> PassResult<(Self::Output, bool)>;
}

pub trait TransformPass: GlobalPassMut<Output = ()> {
    fn register(passman: &mut PassManager)
    where
        Self: Sized;
}

#[derive(Default)]
pub struct PassManager {
    transforms: FxHashMap<String, Box<dyn TransformPass>>,
}

#[derive(Default)]
pub struct Pipeline {
    passes: Vec<String>,
}

impl Pipeline {
    pub fn add_pass(&mut self, name: impl Into<String>) { self.passes.push(name.into()); }
}

impl PassManager {
    pub fn new() -> Self { Self::default() }

    pub fn register_transform<T: TransformPass + 'static>(
        &mut self,
        name: impl Into<String>,
        pass: T,
    ) {
        self.transforms.insert(name.into(), Box::new(pass));
    }

    pub fn gather_transform_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.transforms.keys().cloned().collect();
        names.sort();
        names
    }

    /// Run one transform to local convergence, bounded by `max_iter`.
    ///
    /// Returns the number of iterations taken.
    pub fn run_transform(
        &mut self,
        name: impl Into<String>,
        program: &mut Program,
        max_iter: usize,
    ) -> PassResult<usize> {
        let name = name.into();
        let transform = self
            .transforms
            .get_mut(&name)
            .ok_or_else(|| PassError::other(name.clone(), format!("unknown pass `{name}`").into()))?;

        let mut iter = 0;
        for _ in 0..max_iter {
            iter += 1;
            let ((), changed) = GlobalPassMut::run(transform.as_mut(), program)?;
            if !changed {
                break;
            }
        }
        Ok(iter)
    }

    /// Run a pipeline of transforms until a whole round leaves the program
    /// unchanged, bounded by `max_iter` rounds.
    pub fn run_pipeline(
        &mut self,
        program: &mut Program,
        pipeline: &Pipeline,
        local_max_iter: usize,
        max_iter: usize,
    ) -> PassResult<usize> {
        let mut changed = true;
        let mut total_iter = 0;
        while changed {
            changed = false;
            for pass_name in &pipeline.passes {
                let iter = self.run_transform(pass_name, program, local_max_iter)?;
                if iter > 1 {
                    changed = true;
                }
            }
            total_iter += 1;

            if total_iter > max_iter {
                break;
            }
        }
        Ok(total_iter)
    }
}
