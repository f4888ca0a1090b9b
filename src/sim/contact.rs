//! Contact classification
//!
//! Turns engine contact-begin events into domain events. `classify` is a pure
//! function of the two body categories; `TickContacts` collects the results of
//! one tick with set semantics so each event is handled exactly once.

use std::collections::{BTreeMap, BTreeSet};

use glam::Vec2;

use crate::physics::{BodyKind, BodyTag, ContactBody, RawContact};

/// Which wall a racer touched
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WallRef {
    Boundary,
    Custom(u32),
}

impl WallRef {
    pub fn id(self) -> Option<u32> {
        match self {
            WallRef::Boundary => None,
            WallRef::Custom(id) => Some(id),
        }
    }
}

/// Domain-level contact event
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ContactEvent {
    /// Racer touched another racer
    Chaos { racer: usize },
    /// Racer touched a static or kinematic wall
    WallHit {
        racer: usize,
        wall: WallRef,
        point: Vec2,
        /// Points from the wall into the racer
        normal: Vec2,
    },
    /// Racer entered the win zone
    WinZone { racer: usize },
}

fn racer_of(body: &ContactBody) -> Option<usize> {
    match (body.kind, body.tag) {
        (BodyKind::Dynamic, BodyTag::Racer(i)) => Some(i),
        _ => None,
    }
}

fn wall_of(body: &ContactBody) -> Option<WallRef> {
    match (body.kind, body.tag) {
        (BodyKind::Static | BodyKind::Kinematic, BodyTag::Boundary) => Some(WallRef::Boundary),
        (BodyKind::Static | BodyKind::Kinematic, BodyTag::Wall(id)) => Some(WallRef::Custom(id)),
        _ => None,
    }
}

fn is_win_zone(body: &ContactBody) -> bool {
    body.kind == BodyKind::Sensor && body.tag == BodyTag::WinZone
}

/// Classify one contact-begin event
pub fn classify(contact: &RawContact) -> Vec<ContactEvent> {
    let (a, b) = (&contact.a, &contact.b);
    let mut out = Vec::with_capacity(2);

    if let (Some(ra), Some(rb)) = (racer_of(a), racer_of(b)) {
        out.push(ContactEvent::Chaos { racer: ra });
        out.push(ContactEvent::Chaos { racer: rb });
        return out;
    }

    // Orient so that `racer` is the dynamic side; the reported normal points a -> b
    let (racer, other, normal) = match (racer_of(a), racer_of(b)) {
        (Some(r), None) => (r, b, -contact.normal),
        (None, Some(r)) => (r, a, contact.normal),
        _ => return out,
    };

    if let Some(wall) = wall_of(other) {
        out.push(ContactEvent::WallHit {
            racer,
            wall,
            point: contact.point,
            normal,
        });
    } else if is_win_zone(other) {
        out.push(ContactEvent::WinZone { racer });
    }
    out
}

/// Impact recorded for a wall this tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WallImpact {
    pub racer: usize,
    pub point: Vec2,
    pub normal: Vec2,
}

/// Contacts gathered during one tick
#[derive(Debug, Clone, Default)]
pub struct TickContacts {
    /// Racers eligible for a chaos perturbation
    pub chaos: BTreeSet<usize>,
    /// One impact per wall (first writer wins)
    pub walls_hit: BTreeMap<WallRef, WallImpact>,
    /// Every (racer, wall) pair that touched
    pub touches: BTreeSet<(usize, WallRef)>,
    /// Win-zone entries in arrival order, one per racer
    pub win_zone: Vec<usize>,
}

impl TickContacts {
    pub fn clear(&mut self) {
        self.chaos.clear();
        self.walls_hit.clear();
        self.touches.clear();
        self.win_zone.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.chaos.is_empty() && self.walls_hit.is_empty() && self.win_zone.is_empty()
    }

    /// Fold a classified event into the tick's sets
    pub fn record(&mut self, event: ContactEvent) {
        match event {
            ContactEvent::Chaos { racer } => {
                self.chaos.insert(racer);
            }
            ContactEvent::WallHit {
                racer,
                wall,
                point,
                normal,
            } => {
                self.touches.insert((racer, wall));
                self.walls_hit
                    .entry(wall)
                    .or_insert(WallImpact { racer, point, normal });
            }
            ContactEvent::WinZone { racer } => {
                if !self.win_zone.contains(&racer) {
                    self.win_zone.push(racer);
                }
            }
        }
    }

    /// Classify and record a batch of raw engine contacts
    pub fn extend_raw(&mut self, contacts: &[RawContact]) {
        for c in contacts {
            for event in classify(c) {
                self.record(event);
            }
        }
    }
}
