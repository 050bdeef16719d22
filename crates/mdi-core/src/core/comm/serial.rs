use super::{CommError, Communicator};

/// A world with a single worker; every collective is the identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialComm;

impl Communicator for SerialComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn broadcast_bytes(&self, _data: &mut Vec<u8>) -> Result<(), CommError> {
        Ok(())
    }

    fn broadcast_f64(&self, _data: &mut Vec<f64>) -> Result<(), CommError> {
        Ok(())
    }

    fn broadcast_i32(&self, _data: &mut Vec<i32>) -> Result<(), CommError> {
        Ok(())
    }

    fn reduce_sum_f64(&self, local: &[f64]) -> Result<Option<Vec<f64>>, CommError> {
        Ok(Some(local.to_vec()))
    }

    fn reduce_sum_i32(&self, local: &[i32]) -> Result<Option<Vec<i32>>, CommError> {
        Ok(Some(local.to_vec()))
    }

    fn all_gather_f64(&self, local: &[f64]) -> Result<Vec<Vec<f64>>, CommError> {
        Ok(vec![local.to_vec()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_world_is_its_own_root() {
        let comm = SerialComm;
        assert_eq!(comm.rank(), 0);
        assert_eq!(comm.size(), 1);
        assert!(comm.is_root());
    }

    #[test]
    fn serial_reductions_return_local_values() {
        let comm = SerialComm;
        assert_eq!(comm.reduce_sum_f64(&[1.0, 2.0]).unwrap(), Some(vec![1.0, 2.0]));
        assert_eq!(comm.all_reduce_sum_i32(&[3, 4]).unwrap(), vec![3, 4]);
        assert_eq!(comm.all_gather_f64(&[5.0]).unwrap(), vec![vec![5.0]]);
    }
}
