use image::{DynamicImage, RgbImage};
use opencv::{
    core::{Mat, Size, Vector},
    imgcodecs, imgproc,
    prelude::*,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CvUtilsError {
    #[error("Failed to encode frame: {0}")]
    EncodeFrameFailed(opencv::Error),
    #[error("OpenCV decode error: {0}")]
    OpenCvDecodeError(opencv::Error),
    #[error("Decoded image is empty")]
    EmptyImage,
    #[error("Pixel buffer does not match {width}x{height}")]
    PixelLayout { width: i32, height: i32 },
    #[error("OpenCV error: {0}")]
    OpenCvError(opencv::Error),
}

impl From<opencv::Error> for CvUtilsError {
    fn from(err: opencv::Error) -> Self {
        CvUtilsError::OpenCvError(err)
    }
}

pub fn decode(bytes: &[u8]) -> Result<Mat, CvUtilsError> {
    let mat = imgcodecs::imdecode(&Vector::from_slice(bytes), imgcodecs::IMREAD_COLOR)
        .map_err(CvUtilsError::OpenCvDecodeError)?;
    if mat.empty() {
        return Err(CvUtilsError::EmptyImage);
    }
    Ok(mat)
}

pub fn encode_jpg(mat: &Mat) -> Result<Vec<u8>, CvUtilsError> {
    let mut buf = Vector::<u8>::new();
    imgcodecs::imencode(".jpg", mat, &mut buf, &Vector::new())
        .map_err(CvUtilsError::EncodeFrameFailed)?;
    Ok(buf.into())
}

pub fn resize(mat: &Mat, width: i32, height: i32) -> Result<Mat, CvUtilsError> {
    if mat.cols() == width && mat.rows() == height {
        return Ok(mat.try_clone()?);
    }
    let mut resized = Mat::default();
    imgproc::resize(
        mat,
        &mut resized,
        Size::new(width, height),
        0.0,
        0.0,
        imgproc::INTER_LINEAR,
    )?;
    Ok(resized)
}

pub fn to_rgb_image(mat: &Mat) -> Result<DynamicImage, CvUtilsError> {
    let mut rgb = Mat::default();
    imgproc::cvt_color_def(mat, &mut rgb, imgproc::COLOR_BGR2RGB)?;

    let (width, height) = (rgb.cols(), rgb.rows());
    let data = rgb.data_bytes()?.to_vec();
    let buffer = RgbImage::from_raw(width as u32, height as u32, data)
        .ok_or(CvUtilsError::PixelLayout { width, height })?;

    Ok(DynamicImage::ImageRgb8(buffer))
}
