// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Implementation of a ring buffer.
//!
//! Besides element-wise access through [`Queue`], the buffer supports bulk
//! copies in and out. Bulk enqueues are all-or-nothing: a block that does not
//! fit is rejected whole, so a reader never observes half of a block.

use core::cmp;

use crate::collections::queue::Queue;

pub struct RingBuffer<'a, T: 'a> {
    ring: &'a mut [T],
    head: usize,
    tail: usize,
}

impl<'a, T: Copy> RingBuffer<'a, T> {
    pub fn new(ring: &'a mut [T]) -> RingBuffer<'a, T> {
        RingBuffer {
            head: 0,
            tail: 0,
            ring,
        }
    }

    /// Maximum number of elements the buffer can hold.
    ///
    /// One slot of the backing storage is never used, because `head == tail`
    /// denotes the empty buffer.
    pub fn capacity(&self) -> usize {
        self.ring.len().saturating_sub(1)
    }

    /// Returns the number of elements that can be enqueued until the ring
    /// buffer is full.
    pub fn available_len(&self) -> usize {
        self.capacity().saturating_sub(Queue::len(self))
    }

    /// Copies all of `src` to the back of the buffer.
    ///
    /// Returns `src.len()` if the whole slice was enqueued, or 0 if it did not
    /// fit, in which case the buffer is unchanged.
    pub fn enqueue_slice(&mut self, src: &[T]) -> usize {
        if src.is_empty() || src.len() > self.available_len() {
            return 0;
        }

        let size = self.ring.len();
        let first = cmp::min(src.len(), size - self.tail);
        self.ring[self.tail..self.tail + first].copy_from_slice(&src[..first]);
        let rest = src.len() - first;
        self.ring[..rest].copy_from_slice(&src[first..]);
        self.tail = (self.tail + src.len()) % size;
        src.len()
    }

    /// Moves up to `dest.len()` elements from the front of the buffer into
    /// `dest`, returning how many were copied.
    pub fn dequeue_into(&mut self, dest: &mut [T]) -> usize {
        let count = cmp::min(Queue::len(self), dest.len());
        if count == 0 {
            return 0;
        }

        let size = self.ring.len();
        let first = cmp::min(count, size - self.head);
        dest[..first].copy_from_slice(&self.ring[self.head..self.head + first]);
        dest[first..count].copy_from_slice(&self.ring[..count - first]);
        self.head = (self.head + count) % size;
        count
    }
}

impl<T: Copy> Queue<T> for RingBuffer<'_, T> {
    fn has_elements(&self) -> bool {
        self.head != self.tail
    }

    fn is_full(&self) -> bool {
        self.ring.len() == 0 || self.head == ((self.tail + 1) % self.ring.len())
    }

    fn len(&self) -> usize {
        if self.tail > self.head {
            self.tail - self.head
        } else if self.tail < self.head {
            (self.ring.len() - self.head) + self.tail
        } else {
            // head equals tail, length is zero
            0
        }
    }

    fn enqueue(&mut self, val: T) -> bool {
        if self.is_full() {
            // Incrementing tail will overwrite head
            false
        } else {
            self.ring[self.tail] = val;
            self.tail = (self.tail + 1) % self.ring.len();
            true
        }
    }

    fn dequeue(&mut self) -> Option<T> {
        if self.has_elements() {
            let val = self.ring[self.head];
            self.head = (self.head + 1) % self.ring.len();
            Some(val)
        } else {
            None
        }
    }

    fn empty(&mut self) {
        self.head = 0;
        self.tail = 0;
    }
}
