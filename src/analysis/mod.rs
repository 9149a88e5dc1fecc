pub mod segmentation;
pub mod ssim;
