//! Coefficient Scan Orders
//!
//! A scan order maps scan index to raster position and carries, per scan
//! index, the two raster neighbors whose energy classes form the context of
//! the next token. Every neighbor is coded strictly earlier in the scan.
//!
//! Orders are generated once per process and shared read-only.

use std::sync::OnceLock;

use tracing::debug;

use super::tables::{TxSize, TxType, TX_SIZES};

/// Scan family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanKind {
    /// Anti-diagonal order, for blocks without a dominant direction
    Default,
    /// Row-major bias, paired with vertical ADST
    Row,
    /// Column-major bias, paired with horizontal ADST
    Col,
}

impl ScanKind {
    const ALL: [ScanKind; 3] = [ScanKind::Default, ScanKind::Row, ScanKind::Col];

    /// Scan family used for a transform
    pub fn for_transform(tx_size: TxSize, tx_type: TxType) -> Self {
        match (tx_size, tx_type) {
            (TxSize::Tx32x32, _) => ScanKind::Default,
            (_, TxType::AdstDct) => ScanKind::Row,
            (_, TxType::DctAdst) => ScanKind::Col,
            _ => ScanKind::Default,
        }
    }

    /// Sort key for raster position (row, col); ties on the first component
    /// are broken by the second
    fn key(&self, row: usize, col: usize) -> (usize, usize) {
        match self {
            ScanKind::Default => (row + col, col),
            ScanKind::Row => (2 * row + col, row),
            ScanKind::Col => (row + 2 * col, col),
        }
    }

    /// The two context neighbors of (row, col), in raster positions
    fn neighbors(&self, row: usize, col: usize, size: usize) -> [u16; 2] {
        let pos = |r: usize, c: usize| (r * size + c) as u16;
        match (row, col) {
            (0, 0) => [0, 0],
            (0, c) => [pos(0, c - 1); 2],
            (r, 0) => [pos(r - 1, 0); 2],
            (r, c) => match self {
                ScanKind::Default => [pos(r - 1, c), pos(r, c - 1)],
                ScanKind::Row => [pos(r, c - 1); 2],
                ScanKind::Col => [pos(r - 1, c); 2],
            },
        }
    }
}

/// Immutable scan order for one transform size and scan family
#[derive(Debug, Clone)]
pub struct ScanOrder {
    /// Scan index -> raster position
    pub scan: Vec<u16>,
    /// Raster position -> scan index
    pub iscan: Vec<u16>,
    /// Scan index -> two raster positions coded earlier
    pub neighbors: Vec<[u16; 2]>,
}

impl ScanOrder {
    /// Build the scan order for a square block of `size` samples per side
    pub fn generate(size: usize, kind: ScanKind) -> Self {
        let count = size * size;
        let mut positions: Vec<usize> = (0..count).collect();
        positions.sort_by_key(|&p| kind.key(p / size, p % size));

        let scan: Vec<u16> = positions.iter().map(|&p| p as u16).collect();

        let mut iscan = vec![0u16; count];
        for (i, &p) in scan.iter().enumerate() {
            iscan[p as usize] = i as u16;
        }

        let neighbors = positions
            .iter()
            .map(|&p| kind.neighbors(p / size, p % size, size))
            .collect();

        ScanOrder {
            scan,
            iscan,
            neighbors,
        }
    }

    /// Number of scan positions
    pub fn len(&self) -> usize {
        self.scan.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scan.is_empty()
    }
}

type ScanSet = [[ScanOrder; 3]; TX_SIZES];

fn scan_set() -> &'static ScanSet {
    static SCANS: OnceLock<ScanSet> = OnceLock::new();
    SCANS.get_or_init(|| {
        debug!("Building coefficient scan orders");
        TxSize::ALL.map(|tx_size| {
            ScanKind::ALL.map(|kind| ScanOrder::generate(tx_size.size(), kind))
        })
    })
}

/// Scan order used for a transform size and type
pub fn get_scan_order(tx_size: TxSize, tx_type: TxType) -> &'static ScanOrder {
    let kind = ScanKind::for_transform(tx_size, tx_type);
    &scan_set()[tx_size as usize][kind as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_orders() -> Vec<(TxSize, TxType, &'static ScanOrder)> {
        let mut orders = Vec::new();
        for tx_size in TxSize::ALL {
            for tx_type in TxType::ALL {
                orders.push((tx_size, tx_type, get_scan_order(tx_size, tx_type)));
            }
        }
        orders
    }

    #[test]
    fn test_scan_is_permutation() {
        for (tx_size, _, order) in all_orders() {
            assert_eq!(order.len(), tx_size.num_coeffs());
            let mut seen = vec![false; order.len()];
            for &p in &order.scan {
                assert!(!seen[p as usize]);
                seen[p as usize] = true;
            }
            for (i, &p) in order.scan.iter().enumerate() {
                assert_eq!(order.iscan[p as usize] as usize, i);
            }
        }
    }

    #[test]
    fn test_scan_starts_at_dc() {
        for (_, _, order) in all_orders() {
            assert_eq!(order.scan[0], 0);
            assert_eq!(order.neighbors[0], [0, 0]);
        }
    }

    #[test]
    fn test_neighbors_coded_earlier() {
        for (tx_size, tx_type, order) in all_orders() {
            for i in 1..order.len() {
                for &n in &order.neighbors[i] {
                    assert!(
                        (order.iscan[n as usize] as usize) < i,
                        "{:?} {:?} scan index {} neighbor {}",
                        tx_size,
                        tx_type,
                        i,
                        n
                    );
                }
            }
        }
    }

    #[test]
    fn test_default_4x4_order() {
        let order = get_scan_order(TxSize::Tx4x4, TxType::DctDct);
        assert_eq!(&order.scan[..6], &[0, 4, 1, 8, 5, 2]);
        // Position 5 (row 1, col 1) uses above and left
        let idx = order.iscan[5] as usize;
        assert_eq!(order.neighbors[idx], [1, 4]);
    }

    #[test]
    fn test_scan_kind_selection() {
        assert_eq!(
            ScanKind::for_transform(TxSize::Tx8x8, TxType::AdstDct),
            ScanKind::Row
        );
        assert_eq!(
            ScanKind::for_transform(TxSize::Tx16x16, TxType::DctAdst),
            ScanKind::Col
        );
        assert_eq!(
            ScanKind::for_transform(TxSize::Tx4x4, TxType::AdstAdst),
            ScanKind::Default
        );
        assert_eq!(
            ScanKind::for_transform(TxSize::Tx32x32, TxType::DctDct),
            ScanKind::Default
        );
    }

    #[test]
    fn test_row_scan_prefers_rows() {
        let order = get_scan_order(TxSize::Tx8x8, TxType::AdstDct);
        // Walks along the first row before stepping down
        assert_eq!(&order.scan[..3], &[0, 1, 2]);
    }
}
