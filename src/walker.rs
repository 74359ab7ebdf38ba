//! Rhythmic traversal of sequence content.
//!
//! [`SequenceWalker`] is an iterator of [`WalkStep`]s: one `Enter` and one `Leave` step
//! per content item, in document order, each tagged with the exact rhythmic position.
//! Inside a tuplet every written value is multiplied by the tuplet's `outer / inner`
//! ratio (composing across nested tuplets); grace content and the notes of a multi-note
//! tremolo are walked at scale zero so they take no metric time.
//!
//! [`walk_sequence`] drives the iterator and calls a [`SequenceVisitor`], which may skip a
//! container's children or stop the walk.

use crate::base::View;
use crate::content::{dispatch, DispatchMode};
use crate::error::MnxError;
use crate::fraction::{check_non_negative, FractionValue};
use crate::pointer::JsonPointer;
use crate::sequence::{ContentArray, ContentItem, Event, Grace, MultiNoteTremolo, Sequence, SequenceContent, Space, Tuplet};
use log::trace;

/// Deepest tuplet nesting the walker accepts.
pub const MAX_TUPLET_DEPTH: usize = 16;

#[derive(Debug, Clone, PartialEq)]
pub struct WalkOptions {
    pub dispatch: DispatchMode,
    /// Position of the first item, normally zero.
    pub start: FractionValue,
    /// Length used for full-measure events. When `None` it is taken from the time
    /// signature governing the sequence's measure.
    pub full_measure: Option<FractionValue>,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            dispatch: DispatchMode::Strict,
            start: FractionValue::zero(),
            full_measure: None,
        }
    }
}

impl WalkOptions {
    #[must_use]
    pub fn with_dispatch(dispatch: DispatchMode) -> Self {
        Self {
            dispatch,
            ..Self::default()
        }
    }
}

/// Where the walker is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkState {
    AtMeasureStart,
    InSequence {
        position: FractionValue,
    },
    InTuplet {
        position: FractionValue,
        scale: FractionValue,
        depth: usize,
    },
    InGrace {
        position: FractionValue,
    },
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Enter,
    Leave,
}

/// One position-tagged step of a walk.
#[derive(Debug, Clone, PartialEq)]
pub struct WalkStep {
    pub phase: Phase,
    pub item: ContentItem,
    /// Where the item begins.
    pub start: FractionValue,
    /// The walker's position: `start` on enter, the item's end on leave.
    pub position: FractionValue,
    /// The item's scaled length as written: event or space duration, tuplet or tremolo
    /// outer quantity. Zero inside grace content.
    pub duration: FractionValue,
    /// The scale applied to this item's written values.
    pub scale: FractionValue,
    /// Number of enclosing tuplets.
    pub depth: usize,
    pub in_grace: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContainerKind {
    Tuplet,
    Grace,
    Tremolo,
}

#[derive(Debug)]
struct Owner {
    kind: ContainerKind,
    item: ContentItem,
    start: FractionValue,
    duration: FractionValue,
    scale: FractionValue,
    in_grace: bool,
}

#[derive(Debug)]
struct Frame {
    content: ContentArray,
    next: usize,
    len: usize,
    scale: FractionValue,
    in_grace: bool,
    depth: usize,
    owner: Option<Owner>,
}

#[derive(Debug)]
enum Pending {
    Leave(WalkStep),
    Descend(Frame),
    Skipped(Frame),
}

/// Iterator over the rhythmic steps of one sequence.
///
/// After an error the iterator yields that error once and then ends.
#[derive(Debug)]
pub struct SequenceWalker {
    sequence: Sequence,
    options: WalkOptions,
    stack: Vec<Frame>,
    pending: Option<Pending>,
    position: FractionValue,
    started: bool,
    done: bool,
    full_measure: Option<Option<FractionValue>>,
    warnings: Vec<MnxError>,
}

impl SequenceWalker {
    #[must_use]
    pub fn new(sequence: Sequence, options: WalkOptions) -> Self {
        let position = options.start;
        Self {
            sequence,
            options,
            stack: Vec::new(),
            pending: None,
            position,
            started: false,
            done: false,
            full_measure: None,
            warnings: Vec::new(),
        }
    }

    /// The current rhythmic position.
    #[must_use]
    pub fn position(&self) -> FractionValue {
        self.position
    }

    #[must_use]
    pub fn state(&self) -> WalkState {
        if self.done {
            return WalkState::Done;
        }
        let position = self.position;
        match self.stack.last() {
            None => WalkState::AtMeasureStart,
            Some(frame) if frame.in_grace => WalkState::InGrace { position },
            Some(frame) if frame.depth > 0 => WalkState::InTuplet {
                position,
                scale: frame.scale,
                depth: frame.depth,
            },
            Some(_) => WalkState::InSequence { position },
        }
    }

    /// Unrecognized elements skipped under lenient dispatch.
    #[must_use]
    pub fn warnings(&self) -> &[MnxError] {
        &self.warnings
    }

    /// Skips the children of the container whose `Enter` step was just returned. The
    /// next step is that container's `Leave`, advanced by its full scaled length.
    pub fn skip_children(&mut self) {
        if let Some(Pending::Descend(frame)) = self.pending.take() {
            self.pending = Some(Pending::Skipped(frame));
        }
    }

    fn full_measure(&mut self) -> Option<FractionValue> {
        if let Some(length) = self.options.full_measure {
            return Some(length);
        }
        if self.full_measure.is_none() {
            let length = self
                .sequence
                .part_measure()
                .and_then(|measure| measure.calc_duration())
                .ok()
                .flatten();
            self.full_measure = Some(length);
        }
        self.full_measure.flatten()
    }

    fn step(&mut self) -> Result<Option<WalkStep>, MnxError> {
        if !self.started {
            self.started = true;
            let content = self.sequence.content()?;
            let len = content.len()?;
            self.stack.push(Frame {
                content,
                next: 0,
                len,
                scale: FractionValue::one(),
                in_grace: false,
                depth: 0,
                owner: None,
            });
        }
        match self.pending.take() {
            Some(Pending::Leave(step)) => {
                self.position = step.position;
                return Ok(Some(step));
            }
            Some(Pending::Descend(frame)) => self.stack.push(frame),
            Some(Pending::Skipped(frame)) => return self.leave(frame, true).map(Some),
            None => {}
        }
        loop {
            let Some(frame) = self.stack.last_mut() else {
                return Ok(None);
            };
            if frame.next >= frame.len {
                let Some(frame) = self.stack.pop() else {
                    return Ok(None);
                };
                if frame.owner.is_none() {
                    return Ok(None);
                }
                return self.leave(frame, false).map(Some);
            }
            let node = frame.content.node().index(frame.next);
            frame.next += 1;
            let (scale, in_grace, depth) = (frame.scale, frame.in_grace, frame.depth);
            let item = dispatch::<SequenceContent>(node, self.options.dispatch)?;
            if let ContentItem::Unknown(object) = &item {
                self.warnings.push(MnxError::UnrecognizedVariant {
                    pointer: object.pointer().clone(),
                    type_name: object.type_name()?.unwrap_or_default(),
                });
                continue;
            }
            return self.enter(item, scale, in_grace, depth).map(Some);
        }
    }

    fn enter(
        &mut self,
        item: ContentItem,
        scale: FractionValue,
        in_grace: bool,
        depth: usize,
    ) -> Result<WalkStep, MnxError> {
        check_non_negative(item.pointer(), self.position)?;
        let start = self.position;
        let child = |kind, content: ContentArray, child_scale, child_in_grace, child_depth, duration| {
            let len = content.len()?;
            Ok::<_, MnxError>(Frame {
                content,
                next: 0,
                len,
                scale: child_scale,
                in_grace: child_in_grace,
                depth: child_depth,
                owner: Some(Owner {
                    kind,
                    item: item.clone(),
                    start,
                    duration,
                    scale,
                    in_grace,
                }),
            })
        };
        let (duration, pending) = match &item {
            ContentItem::Event(event) => {
                let full_measure = if event.measure()?.unwrap_or(false) {
                    self.full_measure()
                } else {
                    None
                };
                let duration = scaled(event.calc_duration(full_measure)?, scale, event.pointer())?;
                (duration, None)
            }
            ContentItem::Space(space) => (scaled(space.duration()?.to_fraction()?, scale, space.pointer())?, None),
            ContentItem::Tuplet(tuplet) => {
                if depth >= MAX_TUPLET_DEPTH {
                    return Err(MnxError::malformed(
                        tuplet.pointer(),
                        format!("tuplets nested more than {MAX_TUPLET_DEPTH} deep"),
                    ));
                }
                let duration = scaled(tuplet.outer()?.to_fraction()?, scale, tuplet.pointer())?;
                let frame = child(
                    ContainerKind::Tuplet,
                    tuplet.content()?,
                    scaled(tuplet.ratio()?, scale, tuplet.pointer())?,
                    in_grace,
                    depth + 1,
                    duration,
                )?;
                (duration, Some(frame))
            }
            ContentItem::Grace(grace) => {
                if in_grace {
                    return Err(MnxError::malformed(grace.pointer(), "grace notes cannot contain grace notes"));
                }
                let frame = child(
                    ContainerKind::Grace,
                    grace.content()?,
                    FractionValue::zero(),
                    true,
                    depth,
                    FractionValue::zero(),
                )?;
                (FractionValue::zero(), Some(frame))
            }
            ContentItem::MultiNoteTremolo(tremolo) => {
                let duration = scaled(tremolo.outer()?.to_fraction()?, scale, tremolo.pointer())?;
                let frame = child(
                    ContainerKind::Tremolo,
                    tremolo.content()?,
                    FractionValue::zero(),
                    in_grace,
                    depth,
                    duration,
                )?;
                (duration, Some(frame))
            }
            ContentItem::Unknown(object) => {
                return Err(MnxError::UnrecognizedVariant {
                    pointer: object.pointer().clone(),
                    type_name: object.type_name()?.unwrap_or_default(),
                });
            }
        };
        let step = WalkStep {
            phase: Phase::Enter,
            item,
            start,
            position: start,
            duration,
            scale,
            depth,
            in_grace,
        };
        self.pending = Some(match pending {
            Some(frame) => Pending::Descend(frame),
            None => {
                let end = start
                    .checked_add(duration)
                    .ok_or_else(|| MnxError::overflow(step.item.pointer()))?;
                check_non_negative(step.item.pointer(), end)?;
                Pending::Leave(WalkStep {
                    phase: Phase::Leave,
                    position: end,
                    ..step.clone()
                })
            }
        });
        Ok(step)
    }

    fn leave(&mut self, frame: Frame, skipped: bool) -> Result<WalkStep, MnxError> {
        let Some(owner) = frame.owner else {
            return Err(MnxError::malformed(self.sequence.pointer(), "left the sequence root"));
        };
        let end = match owner.kind {
            ContainerKind::Tuplet if !skipped => self.position,
            _ => owner
                .start
                .checked_add(owner.duration)
                .ok_or_else(|| MnxError::overflow(owner.item.pointer()))?,
        };
        check_non_negative(owner.item.pointer(), end)?;
        self.position = end;
        Ok(WalkStep {
            phase: Phase::Leave,
            item: owner.item,
            start: owner.start,
            position: end,
            duration: owner.duration,
            scale: owner.scale,
            depth: frame.depth.saturating_sub(usize::from(owner.kind == ContainerKind::Tuplet)),
            in_grace: owner.in_grace,
        })
    }
}

impl Iterator for SequenceWalker {
    type Item = Result<WalkStep, MnxError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.step() {
            Ok(Some(step)) => {
                trace!(
                    "{:?} {} at {} ({})",
                    step.phase,
                    step.item.type_name(),
                    step.position,
                    step.item.pointer()
                );
                Some(Ok(step))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

/// What a visitor wants next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WalkControl {
    #[default]
    Continue,
    /// Only meaningful from an `enter_*` hook of a container.
    SkipChildren,
    Stop,
}

/// Hooks called by [`walk_sequence`]. Every hook defaults to `Continue`.
#[allow(unused_variables)]
pub trait SequenceVisitor {
    fn enter_event(&mut self, event: &Event, step: &WalkStep) -> WalkControl {
        WalkControl::Continue
    }

    fn leave_event(&mut self, event: &Event, step: &WalkStep) -> WalkControl {
        WalkControl::Continue
    }

    /// Called after `enter_event` for events that are rests.
    fn rest(&mut self, event: &Event, step: &WalkStep) -> WalkControl {
        WalkControl::Continue
    }

    fn space(&mut self, space: &Space, step: &WalkStep) -> WalkControl {
        WalkControl::Continue
    }

    fn enter_tuplet(&mut self, tuplet: &Tuplet, step: &WalkStep) -> WalkControl {
        WalkControl::Continue
    }

    fn leave_tuplet(&mut self, tuplet: &Tuplet, step: &WalkStep) -> WalkControl {
        WalkControl::Continue
    }

    fn enter_grace(&mut self, grace: &Grace, step: &WalkStep) -> WalkControl {
        WalkControl::Continue
    }

    fn leave_grace(&mut self, grace: &Grace, step: &WalkStep) -> WalkControl {
        WalkControl::Continue
    }

    fn enter_tremolo(&mut self, tremolo: &MultiNoteTremolo, step: &WalkStep) -> WalkControl {
        WalkControl::Continue
    }

    fn leave_tremolo(&mut self, tremolo: &MultiNoteTremolo, step: &WalkStep) -> WalkControl {
        WalkControl::Continue
    }
}

/// How a walk ended.
#[derive(Debug, Clone, PartialEq)]
pub struct WalkOutcome {
    /// Steps delivered to the visitor.
    pub steps: usize,
    /// Position when the walk ended.
    pub end_position: FractionValue,
    /// A visitor returned `Stop`.
    pub cancelled: bool,
    /// The error that ended the walk early, if any.
    pub error: Option<MnxError>,
    pub warnings: Vec<MnxError>,
}

impl WalkOutcome {
    /// True when every step was visited.
    #[must_use]
    pub fn completed(&self) -> bool {
        !self.cancelled && self.error.is_none()
    }

    /// # Errors
    /// The error that ended the walk, if any.
    pub fn into_result(self) -> Result<FractionValue, MnxError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.end_position),
        }
    }
}

fn scaled(value: FractionValue, scale: FractionValue, pointer: &JsonPointer) -> Result<FractionValue, MnxError> {
    value.checked_mul(scale).ok_or_else(|| MnxError::overflow(pointer))
}

fn visit<V: SequenceVisitor + ?Sized>(visitor: &mut V, step: &WalkStep) -> Result<WalkControl, MnxError> {
    let entering = step.phase == Phase::Enter;
    Ok(match &step.item {
        ContentItem::Event(event) if entering => match visitor.enter_event(event, step) {
            WalkControl::Continue if event.is_rest()? => visitor.rest(event, step),
            control => control,
        },
        ContentItem::Event(event) => visitor.leave_event(event, step),
        ContentItem::Space(space) if entering => visitor.space(space, step),
        ContentItem::Space(_) => WalkControl::Continue,
        ContentItem::Tuplet(tuplet) if entering => visitor.enter_tuplet(tuplet, step),
        ContentItem::Tuplet(tuplet) => visitor.leave_tuplet(tuplet, step),
        ContentItem::Grace(grace) if entering => visitor.enter_grace(grace, step),
        ContentItem::Grace(grace) => visitor.leave_grace(grace, step),
        ContentItem::MultiNoteTremolo(tremolo) if entering => visitor.enter_tremolo(tremolo, step),
        ContentItem::MultiNoteTremolo(tremolo) => visitor.leave_tremolo(tremolo, step),
        ContentItem::Unknown(_) => WalkControl::Continue,
    })
}

/// Walks `sequence`, calling `visitor` for every step.
pub fn walk_sequence<V: SequenceVisitor + ?Sized>(
    sequence: &Sequence,
    visitor: &mut V,
    options: WalkOptions,
) -> WalkOutcome {
    let mut walker = SequenceWalker::new(sequence.clone(), options);
    let mut steps = 0;
    let mut cancelled = false;
    let mut error = None;
    while let Some(step) = walker.next() {
        let step = match step {
            Ok(step) => step,
            Err(err) => {
                error = Some(err);
                break;
            }
        };
        steps += 1;
        match visit(visitor, &step) {
            Ok(WalkControl::Continue) => {}
            Ok(WalkControl::SkipChildren) => walker.skip_children(),
            Ok(WalkControl::Stop) => {
                cancelled = true;
                break;
            }
            Err(err) => {
                error = Some(err);
                break;
            }
        }
    }
    WalkOutcome {
        steps,
        end_position: walker.position(),
        cancelled,
        error,
        warnings: walker.warnings,
    }
}

struct EventVisitor<F> {
    on_event: F,
}

impl<F: FnMut(&Event, &WalkStep) -> WalkControl> SequenceVisitor for EventVisitor<F> {
    fn enter_event(&mut self, event: &Event, step: &WalkStep) -> WalkControl {
        (self.on_event)(event, step)
    }
}

/// Calls `on_event` with every event (including grace and tremolo notes) and its
/// `Enter` step.
pub fn for_each_event<F>(sequence: &Sequence, options: WalkOptions, on_event: F) -> WalkOutcome
where
    F: FnMut(&Event, &WalkStep) -> WalkControl,
{
    walk_sequence(sequence, &mut EventVisitor { on_event }, options)
}
