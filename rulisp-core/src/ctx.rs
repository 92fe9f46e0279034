//! The bundle of mutable state a primitive or the evaluator needs: the
//! heap, the host's random source, and the host's output sink. Bundled so
//! `eval` and `primitives::dispatch*` don't have to thread three separate
//! parameters through every call.

pub struct Ctx<'a, R, W> {
    pub heap: &'a mut crate::heap::Heap,
    pub random: &'a mut R,
    pub out: &'a mut W,
}
