// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Interface for obtaining buffers at runtime.
//!
//! Memory that a bus controller reads or writes by DMA must be coherent and
//! its bus address must be known, so it comes as a [`DmaBuffer`]. Plain
//! kernel memory is a bare slice.

use crate::ErrorCode;

/// A DMA-safe buffer paired with the address the bus controller uses for it.
pub struct DmaBuffer {
    pub buf: &'static mut [u8],
    pub dma_addr: usize,
}

pub trait BufferAllocator {
    /// Allocate `len` bytes of DMA-coherent memory.
    fn alloc_coherent(&self, len: usize) -> Result<DmaBuffer, ErrorCode>;

    /// Return memory obtained from [`BufferAllocator::alloc_coherent`].
    fn free_coherent(&self, buffer: DmaBuffer);

    /// Allocate `len` bytes of kernel memory.
    fn alloc(&self, len: usize) -> Result<&'static mut [u8], ErrorCode>;

    /// Return memory obtained from [`BufferAllocator::alloc`].
    fn free(&self, buf: &'static mut [u8]);
}
