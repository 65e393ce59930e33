mod jacobian_test;
