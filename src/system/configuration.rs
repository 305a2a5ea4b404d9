//! Lattice sites and per-cell displacements, with scoped save/restore.

use nalgebra::{DMatrix, DVector, Dyn, MatrixView, U1};
use std::ops::{Deref, DerefMut};

use crate::error::{Error, Result};

/// Borrowed displacement row of one cell.
pub type CellView<'a> = MatrixView<'a, f64, U1, Dyn, U1, Dyn>;

/// The live state of one simulation box: a fixed set of lattice sites and
/// the generalized displacement of every cell from its site.
#[derive(Clone, Debug)]
pub struct Configuration {
    cell_positions: Vec<DVector<f64>>,
    /// One row per cell.
    displacements: DMatrix<f64>,
}

impl Configuration {
    /// All displacements start at zero, i.e. on the reference lattice.
    pub fn new(cell_positions: Vec<DVector<f64>>, coordinate_dim: usize) -> Result<Self> {
        if cell_positions.is_empty() {
            return Err(Error::Config("configuration has no cells".into()));
        }
        if coordinate_dim == 0 {
            return Err(Error::Config("cells need at least one coordinate".into()));
        }
        let n_cells = cell_positions.len();
        Ok(Self {
            cell_positions,
            displacements: DMatrix::zeros(n_cells, coordinate_dim),
        })
    }

    /// Sites of a simple (hyper)cubic lattice, enumerated with the last
    /// dimension running fastest.
    pub fn simple_lattice(n_cells: &[usize], lattice_constant: f64, coordinate_dim: usize) -> Result<Self> {
        let total: usize = n_cells.iter().product();
        let mut positions = Vec::with_capacity(total);
        for flat in 0..total {
            let mut rest = flat;
            let mut site = DVector::zeros(n_cells.len());
            for d in (0..n_cells.len()).rev() {
                site[d] = (rest % n_cells[d]) as f64 * lattice_constant;
                rest /= n_cells[d];
            }
            positions.push(site);
        }
        Self::new(positions, coordinate_dim)
    }

    pub fn num_cells(&self) -> usize {
        self.cell_positions.len()
    }

    pub fn coordinate_dim(&self) -> usize {
        self.displacements.ncols()
    }

    pub fn cell_position(&self, cell: usize) -> &DVector<f64> {
        &self.cell_positions[cell]
    }

    pub fn cell_positions(&self) -> &[DVector<f64>] {
        &self.cell_positions
    }

    pub fn displacement(&self, cell: usize) -> CellView<'_> {
        self.displacements.row(cell)
    }

    pub fn displacements(&self) -> &DMatrix<f64> {
        &self.displacements
    }

    pub fn displacements_mut(&mut self) -> &mut DMatrix<f64> {
        &mut self.displacements
    }

    /// Copy of the current displacements.
    pub fn save(&self) -> Snapshot {
        Snapshot {
            displacements: self.displacements.clone(),
        }
    }

    pub fn restore(&mut self, snapshot: &Snapshot) {
        self.displacements.copy_from(&snapshot.displacements);
    }

    /// Open a transaction that records the current displacements into
    /// `buffer` and puts them back when dropped, unless committed.
    pub fn transaction<'a>(&'a mut self, buffer: &'a mut Snapshot) -> Transaction<'a> {
        if buffer.displacements.shape() == self.displacements.shape() {
            buffer.displacements.copy_from(&self.displacements);
        } else {
            buffer.displacements = self.displacements.clone();
        }
        Transaction {
            config: self,
            saved: buffer,
            committed: false,
        }
    }
}

/// Saved displacements. Also used as a reusable buffer for transactions.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    displacements: DMatrix<f64>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            displacements: DMatrix::zeros(0, 0),
        }
    }
}

impl Snapshot {
    /// An empty buffer shaped for `config`.
    pub fn buffer_for(config: &Configuration) -> Self {
        Self {
            displacements: DMatrix::zeros(config.num_cells(), config.coordinate_dim()),
        }
    }

    pub fn displacement(&self, cell: usize) -> CellView<'_> {
        self.displacements.row(cell)
    }
}

/// Scoped write access to a [`Configuration`]. Every exit path that does not
/// call [`Transaction::commit`] restores the saved displacements.
pub struct Transaction<'a> {
    config: &'a mut Configuration,
    saved: &'a mut Snapshot,
    committed: bool,
}

impl<'a> Transaction<'a> {
    /// Displacements as they were when the transaction opened.
    pub fn saved(&self) -> &Snapshot {
        self.saved
    }

    pub fn commit(mut self) {
        self.committed = true;
    }

    pub fn rollback(self) {}
}

impl<'a> Deref for Transaction<'a> {
    type Target = Configuration;

    fn deref(&self) -> &Configuration {
        self.config
    }
}

impl<'a> DerefMut for Transaction<'a> {
    fn deref_mut(&mut self) -> &mut Configuration {
        self.config
    }
}

impl<'a> Drop for Transaction<'a> {
    fn drop(&mut self) {
        if !self.committed {
            self.config.displacements.copy_from(&self.saved.displacements);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lattice() -> Configuration {
        Configuration::simple_lattice(&[4], 1.5, 1).unwrap()
    }

    #[test]
    fn test_simple_lattice_sites() {
        let config = Configuration::simple_lattice(&[2, 3], 1.0, 2).unwrap();
        assert_eq!(config.num_cells(), 6);
        assert_eq!(config.cell_position(4).as_slice(), &[1.0, 1.0]);
        assert_eq!(config.coordinate_dim(), 2);
    }

    #[test]
    fn test_dropped_transaction_restores() {
        let mut config = lattice();
        config.displacements_mut()[(2, 0)] = 0.25;
        let before = config.save();
        let mut buffer = Snapshot::buffer_for(&config);
        {
            let mut txn = config.transaction(&mut buffer);
            txn.displacements_mut().fill(9.0);
            assert_eq!(txn.saved().displacement(2)[0], 0.25);
        }
        assert_eq!(config.save(), before);
    }

    #[test]
    fn test_committed_transaction_keeps_changes() {
        let mut config = lattice();
        let mut buffer = Snapshot::buffer_for(&config);
        let mut txn = config.transaction(&mut buffer);
        txn.displacements_mut()[(1, 0)] = -0.5;
        txn.commit();
        assert_eq!(config.displacement(1)[0], -0.5);
    }

    #[test]
    fn test_restore_after_early_return() {
        fn fails(config: &mut Configuration, buffer: &mut Snapshot) -> Result<()> {
            let mut txn = config.transaction(buffer);
            txn.displacements_mut()[(0, 0)] = 3.0;
            Err(Error::Config("boom".into()))
        }
        let mut config = lattice();
        let mut buffer = Snapshot::buffer_for(&config);
        assert!(fails(&mut config, &mut buffer).is_err());
        assert_eq!(config.displacement(0)[0], 0.0);
    }
}
