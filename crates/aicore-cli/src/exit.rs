// Exit codes for scripted callers
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_GENERIC_FAIL: i32 = 1;
pub const EXIT_CONFIG_FAIL: i32 = 2;
pub const EXIT_PARAM_FAIL: i32 = 3;
pub const EXIT_KERNEL_FAIL: i32 = 4;

/// Exit code for an error chain: the first aicore error found decides.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    use aicore_common::{AicoreError, KernelError, ParamError, SocConfigError};

    for cause in err.chain() {
        if cause.is::<SocConfigError>() {
            return EXIT_CONFIG_FAIL;
        }
        if cause.is::<ParamError>() {
            return EXIT_PARAM_FAIL;
        }
        if cause.is::<KernelError>() {
            return EXIT_KERNEL_FAIL;
        }
        if let Some(e) = cause.downcast_ref::<AicoreError>() {
            return match e {
                AicoreError::Param(_) => EXIT_PARAM_FAIL,
                AicoreError::Kernel(_) => EXIT_KERNEL_FAIL,
                AicoreError::Config(_) => EXIT_CONFIG_FAIL,
                AicoreError::Io(_) => EXIT_GENERIC_FAIL,
            };
        }
    }
    EXIT_GENERIC_FAIL
}

#[cfg(test)]
mod tests {
    use super::*;
    use aicore_common::{AicoreError, KernelError, ParamError};
    use anyhow::Context;

    #[test]
    fn kernel_errors_map_through_context() {
        let err: anyhow::Result<()> = Err(AicoreError::from(KernelError::InvalidTiling {
            reason: "short".into(),
        }))
        .context("launch failed");
        assert_eq!(exit_code_for(&err.unwrap_err()), EXIT_KERNEL_FAIL);
    }

    #[test]
    fn bare_kernel_and_param_errors_map() {
        let kernel: anyhow::Error = KernelError::InvalidArguments { reason: "empty shape".into() }.into();
        assert_eq!(exit_code_for(&kernel.context("planning failed")), EXIT_KERNEL_FAIL);

        let param: anyhow::Error = ParamError::InvalidAttr {
            kernel: "binary_cross_entropy".into(),
            attr: "reduction".into(),
            value: "avg".into(),
            rule: "reduction type should in mean/sum/none".into(),
        }
        .into();
        assert_eq!(exit_code_for(&param), EXIT_PARAM_FAIL);
    }

    #[test]
    fn unknown_errors_are_generic() {
        assert_eq!(exit_code_for(&anyhow::anyhow!("boom")), EXIT_GENERIC_FAIL);
        assert_ne!(EXIT_SUCCESS, EXIT_GENERIC_FAIL);
    }
}
