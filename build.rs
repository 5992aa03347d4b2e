// 构建脚本: 链接FFmpeg依赖库
fn main() {
    // 仅在Windows MSVC环境下、启用摄像头采集时添加FFmpeg相关库
    #[cfg(all(target_os = "windows", target_env = "msvc"))]
    {
        if std::env::var_os("CARGO_FEATURE_CAMERA").is_none() {
            return;
        }

        // Intel QSV (Quick Sync Video) 硬件加速
        println!("cargo:rustc-link-lib=dylib=libmfx");

        // OLE 自动化和VFW (DirectShow 摄像头)
        println!("cargo:rustc-link-lib=dylib=oleaut32");
        println!("cargo:rustc-link-lib=dylib=vfw32");

        // Secure Channel (TLS/SSL)
        println!("cargo:rustc-link-lib=dylib=secur32");
    }
}
