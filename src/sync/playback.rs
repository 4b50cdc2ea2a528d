//! Playback state for recorded sessions.
//!
//! Each recorded stream has a cursor into its track. A cursor starts *primed*
//! on frame 0: the next advance delivers the frame under the cursor rather
//! than the one after it. Seeking primes the cursor again, so a seek followed
//! by a wait delivers exactly the frame that was sought.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::SyncError;
use crate::source::recording::RecordedTrack;
use crate::source::types::{Frame, StreamId};

/// Reference point for a relative seek.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeekOrigin {
    /// From the first frame (or earliest timestamp)
    Set,
    /// From the current position
    Current,
    /// From the last frame (or latest timestamp)
    End,
}

/// Outcome of advancing a cursor by one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Advance {
    Frame(Arc<Frame>),
    /// The track looped back to its first frame
    Wrapped(Arc<Frame>),
    /// No more frames and repeat is off
    EndOfData,
}

#[derive(Debug)]
struct Cursor {
    track: RecordedTrack,
    position: usize,
    primed: bool,
    ended: bool,
}

impl Cursor {
    fn new(track: RecordedTrack) -> Self {
        Self {
            track,
            position: 0,
            primed: true,
            ended: false,
        }
    }

    fn place(&mut self, position: usize) {
        self.position = position.min(self.track.len().saturating_sub(1));
        self.primed = true;
        self.ended = false;
    }

    fn current(&self) -> Option<Arc<Frame>> {
        self.track.frame(self.position).cloned()
    }
}

/// Speed, repeat and seek state shared by every recorded stream of a session.
#[derive(Debug)]
pub struct Player {
    cursors: BTreeMap<StreamId, Cursor>,
    speed: f64,
    repeat: bool,
    /// Timestamp of the most recently delivered or sought frame
    position: u64,
}

impl Player {
    pub fn new(speed: f64, repeat: bool) -> Result<Self, SyncError> {
        check_speed(speed)?;
        Ok(Self {
            cursors: BTreeMap::new(),
            speed,
            repeat,
            position: 0,
        })
    }

    pub fn add_track(&mut self, id: StreamId, track: RecordedTrack) {
        if self.cursors.is_empty() {
            self.position = track.first_timestamp();
        } else {
            self.position = self.position.min(track.first_timestamp());
        }
        self.cursors.insert(id, Cursor::new(track));
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Change the playback multiplier. Non-positive or non-finite values are rejected.
    pub fn set_speed(&mut self, speed: f64) -> Result<(), SyncError> {
        check_speed(speed)?;
        self.speed = speed;
        Ok(())
    }

    pub fn is_repeat(&self) -> bool {
        self.repeat
    }

    pub fn set_repeat(&mut self, repeat: bool) {
        self.repeat = repeat;
    }

    pub fn frame_count(&self, id: StreamId) -> Result<usize, SyncError> {
        Ok(self.cursor(id)?.track.len())
    }

    /// Index of the frame under the stream's cursor.
    pub fn tell_frame(&self, id: StreamId) -> Result<u64, SyncError> {
        Ok(self.cursor(id)?.position as u64)
    }

    /// Session position in microseconds.
    pub fn tell_timestamp(&self) -> u64 {
        self.position
    }

    /// Move one stream's cursor to a frame index; other streams follow to the
    /// frame at or before the sought frame's timestamp.
    ///
    /// Targets outside the track are clamped. Returns the resulting index.
    pub fn seek_to_frame(
        &mut self,
        id: StreamId,
        offset: i64,
        origin: SeekOrigin,
    ) -> Result<u64, SyncError> {
        let fallback = self.position;
        let cursor = self.cursor_mut(id)?;
        let last = cursor.track.len().saturating_sub(1) as i64;
        let base = match origin {
            SeekOrigin::Set => 0,
            SeekOrigin::Current => cursor.position as i64,
            SeekOrigin::End => last,
        };
        let target = base.saturating_add(offset).clamp(0, last) as usize;
        cursor.place(target);
        let timestamp = cursor.current().map(|f| f.timestamp).unwrap_or(fallback);

        for (other, cursor) in self.cursors.iter_mut() {
            if *other != id {
                let index = cursor.track.index_at_or_before(timestamp);
                cursor.place(index);
            }
        }
        self.position = timestamp;
        Ok(target as u64)
    }

    /// Move every cursor to the frame at or before a session timestamp.
    ///
    /// Returns the resulting session position in microseconds.
    pub fn seek_to_timestamp(&mut self, offset: i64, origin: SeekOrigin) -> u64 {
        let first = self.first_timestamp();
        let last = self.last_timestamp().max(first);
        let base = match origin {
            SeekOrigin::Set => first,
            SeekOrigin::Current => self.position,
            SeekOrigin::End => last,
        };
        let target = (base as i64).saturating_add(offset).max(0) as u64;
        let target = target.clamp(first, last);

        for cursor in self.cursors.values_mut() {
            let index = cursor.track.index_at_or_before(target);
            cursor.place(index);
        }
        self.position = target;
        target
    }

    /// Deliver the next frame of a stream.
    pub fn advance(&mut self, id: StreamId) -> Result<Advance, SyncError> {
        let repeat = self.repeat;
        let cursor = self.cursor_mut(id)?;
        if cursor.ended {
            return Ok(Advance::EndOfData);
        }

        let mut wrapped = false;
        if cursor.primed {
            cursor.primed = false;
        } else if cursor.position + 1 < cursor.track.len() {
            cursor.position += 1;
        } else if repeat {
            cursor.position = 0;
            wrapped = true;
        } else {
            cursor.ended = true;
            return Ok(Advance::EndOfData);
        }

        let frame = match cursor.current() {
            Some(frame) => frame,
            None => return Ok(Advance::EndOfData),
        };
        self.position = frame.timestamp;

        if wrapped {
            tracing::debug!(stream = %id, "recorded track looped to start");
            Ok(Advance::Wrapped(frame))
        } else {
            Ok(Advance::Frame(frame))
        }
    }

    /// Whether the next advance of this stream would hit end-of-data.
    pub fn would_end(&self, id: StreamId) -> Result<bool, SyncError> {
        let cursor = self.cursor(id)?;
        Ok(cursor.ended
            || (!cursor.primed && cursor.position + 1 >= cursor.track.len() && !self.repeat))
    }

    /// Timestamp of the frame the next advance would deliver.
    pub fn peek_next_timestamp(&self, id: StreamId) -> Result<Option<u64>, SyncError> {
        let cursor = self.cursor(id)?;
        if cursor.ended {
            return Ok(None);
        }
        let next = if cursor.primed {
            cursor.position
        } else if cursor.position + 1 < cursor.track.len() {
            cursor.position + 1
        } else if self.repeat {
            0
        } else {
            return Ok(None);
        };
        Ok(cursor.track.frame(next).map(|f| f.timestamp))
    }

    /// Move a secondary stream's cursor to its frame at or before `timestamp`
    /// and return that frame. Used when one stream drives and the others follow.
    pub fn follow(
        &mut self,
        id: StreamId,
        timestamp: u64,
    ) -> Result<Option<Arc<Frame>>, SyncError> {
        let cursor = self.cursor_mut(id)?;
        cursor.position = cursor.track.index_at_or_before(timestamp);
        cursor.primed = false;
        cursor.ended = false;
        Ok(cursor.current())
    }

    /// Put a stream back at its first frame.
    pub fn rewind(&mut self, id: StreamId) -> Result<(), SyncError> {
        self.cursor_mut(id)?.place(0);
        Ok(())
    }

    pub fn is_ended(&self, id: StreamId) -> Result<bool, SyncError> {
        Ok(self.cursor(id)?.ended)
    }

    fn first_timestamp(&self) -> u64 {
        self.cursors
            .values()
            .map(|c| c.track.first_timestamp())
            .min()
            .unwrap_or(0)
    }

    fn last_timestamp(&self) -> u64 {
        self.cursors
            .values()
            .map(|c| c.track.last_timestamp())
            .max()
            .unwrap_or(0)
    }

    fn cursor(&self, id: StreamId) -> Result<&Cursor, SyncError> {
        self.cursors.get(&id).ok_or(SyncError::Unbound(id))
    }

    fn cursor_mut(&mut self, id: StreamId) -> Result<&mut Cursor, SyncError> {
        self.cursors.get_mut(&id).ok_or(SyncError::Unbound(id))
    }
}

fn check_speed(speed: f64) -> Result<(), SyncError> {
    if speed.is_finite() && speed > 0.0 {
        Ok(())
    } else {
        Err(SyncError::InvalidSpeed(speed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::types::StreamKind;

    fn track(name: &str, kind: StreamKind, stamps: &[u64]) -> RecordedTrack {
        let frames = stamps
            .iter()
            .map(|&ts| Frame::new(1, 1, vec![1], ts, 0, StreamId(0)).unwrap())
            .collect();
        RecordedTrack::new(name, kind, 1000, frames).unwrap()
    }

    fn player(repeat: bool) -> Player {
        let mut player = Player::new(1.0, repeat).unwrap();
        player.add_track(StreamId(1), track("Depth1", StreamKind::Depth, &[0, 100, 200, 300]));
        player.add_track(StreamId(2), track("Image1", StreamKind::Image, &[50, 150, 250]));
        player
    }

    fn frame_ts(advance: Advance) -> Option<u64> {
        match advance {
            Advance::Frame(f) | Advance::Wrapped(f) => Some(f.timestamp),
            Advance::EndOfData => None,
        }
    }

    #[test]
    fn test_first_advance_delivers_first_frame() {
        let mut player = player(false);
        assert_eq!(frame_ts(player.advance(StreamId(1)).unwrap()), Some(0));
        assert_eq!(player.tell_frame(StreamId(1)).unwrap(), 0);
        assert_eq!(frame_ts(player.advance(StreamId(1)).unwrap()), Some(100));
        assert_eq!(player.tell_frame(StreamId(1)).unwrap(), 1);
        assert_eq!(player.tell_timestamp(), 100);
    }

    #[test]
    fn test_seek_to_frame_set_zero() {
        let mut player = player(false);
        player.advance(StreamId(1)).unwrap();
        player.advance(StreamId(1)).unwrap();

        assert_eq!(player.seek_to_frame(StreamId(1), 0, SeekOrigin::Set).unwrap(), 0);
        assert_eq!(player.tell_frame(StreamId(1)).unwrap(), 0);
        assert_eq!(frame_ts(player.advance(StreamId(1)).unwrap()), Some(0));
    }

    #[test]
    fn test_seek_origins_and_clamping() {
        let mut player = player(false);
        assert_eq!(player.seek_to_frame(StreamId(1), -1, SeekOrigin::End).unwrap(), 2);
        assert_eq!(player.seek_to_frame(StreamId(1), 1, SeekOrigin::Current).unwrap(), 3);
        assert_eq!(player.seek_to_frame(StreamId(1), 10, SeekOrigin::Current).unwrap(), 3);
        assert_eq!(player.seek_to_frame(StreamId(1), -10, SeekOrigin::Set).unwrap(), 0);
    }

    #[test]
    fn test_seek_to_frame_moves_other_tracks() {
        let mut player = player(false);
        player.seek_to_frame(StreamId(1), 2, SeekOrigin::Set).unwrap();
        assert_eq!(player.tell_timestamp(), 200);
        // image frame at or before 200us is the one at 150us
        assert_eq!(player.tell_frame(StreamId(2)).unwrap(), 1);
    }

    #[test]
    fn test_seek_to_timestamp() {
        let mut player = player(false);
        assert_eq!(player.seek_to_timestamp(260, SeekOrigin::Set), 260);
        assert_eq!(player.tell_frame(StreamId(1)).unwrap(), 2);
        assert_eq!(player.tell_frame(StreamId(2)).unwrap(), 2);

        assert_eq!(player.seek_to_timestamp(-100, SeekOrigin::End), 200);
        assert_eq!(player.seek_to_timestamp(-1_000, SeekOrigin::Current), 0);
    }

    #[test]
    fn test_end_of_data_without_repeat() {
        let mut player = player(false);
        player.seek_to_frame(StreamId(2), 0, SeekOrigin::End).unwrap();
        assert!(!player.would_end(StreamId(2)).unwrap());
        assert_eq!(frame_ts(player.advance(StreamId(2)).unwrap()), Some(250));
        assert!(player.would_end(StreamId(2)).unwrap());
        assert_eq!(player.advance(StreamId(2)).unwrap(), Advance::EndOfData);
        assert!(player.is_ended(StreamId(2)).unwrap());
        assert_eq!(player.peek_next_timestamp(StreamId(2)).unwrap(), None);

        player.rewind(StreamId(2)).unwrap();
        assert!(!player.is_ended(StreamId(2)).unwrap());
    }

    #[test]
    fn test_repeat_wraps_to_start() {
        let mut player = player(true);
        player.seek_to_frame(StreamId(2), 0, SeekOrigin::End).unwrap();
        player.advance(StreamId(2)).unwrap();
        assert!(!player.would_end(StreamId(2)).unwrap());
        match player.advance(StreamId(2)).unwrap() {
            Advance::Wrapped(frame) => assert_eq!(frame.timestamp, 50),
            other => panic!("expected wrap, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_speed_is_rejected() {
        let mut player = player(true);
        player.set_speed(1.5).unwrap();
        assert_eq!(player.set_speed(0.0), Err(SyncError::InvalidSpeed(0.0)));
        assert_eq!(player.set_speed(-0.1), Err(SyncError::InvalidSpeed(-0.1)));
        assert!(player.set_speed(f64::NAN).is_err());
        assert_eq!(player.speed(), 1.5);
        assert!(Player::new(0.0, true).is_err());
    }

    #[test]
    fn test_follow_tracks_primary_timestamp() {
        let mut player = player(false);
        let frame = player.follow(StreamId(2), 210).unwrap().unwrap();
        assert_eq!(frame.timestamp, 150);
        assert_eq!(player.tell_frame(StreamId(2)).unwrap(), 1);
    }

    #[test]
    fn test_unknown_stream() {
        let player = player(false);
        assert_eq!(
            player.tell_frame(StreamId(9)),
            Err(SyncError::Unbound(StreamId(9)))
        );
    }
}
