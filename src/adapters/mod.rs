// 外部系統的實作：Contrast TeamServer 與各學習平台
pub mod contrast;
pub mod request;
pub mod scw;
pub mod secure_flag;
