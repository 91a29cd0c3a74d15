//! Bar source port trait.

use crate::domain::bar::Bar;
use crate::domain::error::BarwiseError;

/// A pull-based stream of bars in strictly increasing time order.
///
/// Finite sources return `Ok(None)` once exhausted. Live sources block until
/// the next bar exists.
pub trait BarSource {
    fn next_bar(&mut self) -> Result<Option<Bar>, BarwiseError>;
}

impl<S: BarSource + ?Sized> BarSource for &mut S {
    fn next_bar(&mut self) -> Result<Option<Bar>, BarwiseError> {
        (**self).next_bar()
    }
}

impl<S: BarSource + ?Sized> BarSource for Box<S> {
    fn next_bar(&mut self) -> Result<Option<Bar>, BarwiseError> {
        (**self).next_bar()
    }
}

/// Adapts any iterator of bars into a finite [`BarSource`].
#[derive(Debug, Clone)]
pub struct IterSource<I> {
    iter: I,
}

impl<I> IterSource<I>
where
    I: Iterator<Item = Bar>,
{
    pub fn new(iter: impl IntoIterator<IntoIter = I>) -> Self {
        IterSource {
            iter: iter.into_iter(),
        }
    }
}

impl<I> BarSource for IterSource<I>
where
    I: Iterator<Item = Bar>,
{
    fn next_bar(&mut self) -> Result<Option<Bar>, BarwiseError> {
        Ok(self.iter.next())
    }
}
