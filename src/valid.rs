//! Traversal generation stamps.
//!
//! The legacy engine used one process-global `validCount` that every
//! traversal bumped before stamping the elements it visited. Here the
//! counter and the stamp arrays travel together in an explicit value the
//! caller threads through by `&mut`, so two traversals can never alias a
//! counter by accident: each `ValidCount` owns its own stamps. A single
//! instance must still not be shared between interleaved traversals.

/// Generation stamps for the elements of one map.
pub struct ValidCount {
    count: u32,
    lines: Vec<u32>,
    sectors: Vec<u32>,
    subspaces: Vec<u32>,
    polyobjs: Vec<u32>,
}

impl ValidCount {
    pub fn new(lines: usize, sectors: usize, subspaces: usize, polyobjs: usize) -> ValidCount {
        ValidCount {
            count: 0,
            lines: vec![0; lines],
            sectors: vec![0; sectors],
            subspaces: vec![0; subspaces],
            polyobjs: vec![0; polyobjs],
        }
    }

    /// Start a new traversal. Call exactly once per self-contained pass.
    pub fn begin(&mut self) {
        self.count += 1;
    }

    /// Stamp a line; `true` when it had not yet been visited this pass.
    #[inline]
    pub fn visit_line(&mut self, line: u32) -> bool {
        visit(&mut self.lines, self.count, line)
    }

    #[inline]
    pub fn visit_sector(&mut self, sector: u32) -> bool {
        visit(&mut self.sectors, self.count, sector)
    }

    #[inline]
    pub fn visit_subspace(&mut self, subspace: u32) -> bool {
        visit(&mut self.subspaces, self.count, subspace)
    }

    #[inline]
    pub fn visit_polyobj(&mut self, polyobj: u32) -> bool {
        visit(&mut self.polyobjs, self.count, polyobj)
    }
}

#[inline]
fn visit(stamps: &mut [u32], count: u32, id: u32) -> bool {
    let s = &mut stamps[id as usize];
    if *s == count {
        false
    } else {
        *s = count;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_visit_is_rejected() {
        let mut vc = ValidCount::new(4, 0, 0, 0);
        vc.begin();
        assert!(vc.visit_line(2));
        assert!(!vc.visit_line(2));
        // A new pass resets everything.
        vc.begin();
        assert!(vc.visit_line(2));
    }
}
